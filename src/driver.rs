//! Cooperative loop that keeps a [`TimerSession`] ticking.
//!
//! Ticks and display refreshes run on separate intervals so a slow display
//! never changes how time is accounted. Everything happens on the calling
//! task; only the remote mirror leaves it.

use crate::clock::Clock;
use crate::engine::{TimerSession, TimerSnapshot};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Stop was requested; the timer was paused and flushed.
    Stopped,
    /// The timer ran to its natural end.
    Finished,
    /// The timer refused to start.
    Rejected,
}

/// Starts `session` and advances it until it finishes or `stop` turns true
/// (or its sender is dropped). `on_display` receives a snapshot at every
/// display interval and once at the end.
pub async fn drive<F>(
    session: &mut TimerSession,
    clock: &dyn Clock,
    tick_every: Duration,
    display_every: Duration,
    mut stop: watch::Receiver<bool>,
    mut on_display: F,
) -> DriveOutcome
where
    F: FnMut(&TimerSnapshot),
{
    if !session.start(clock.now()) {
        return DriveOutcome::Rejected;
    }

    let mut ticks = interval(tick_every.max(Duration::from_millis(1)));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut display = interval(display_every.max(Duration::from_millis(1)));
    display.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let outcome = loop {
        tokio::select! {
            _ = ticks.tick() => {
                session.tick(clock.now());
                if session.is_finished() {
                    info!("[TIMER] {} finished for project {}", session.activity(), session.project_id());
                    break DriveOutcome::Finished;
                }
            }
            _ = display.tick() => {
                on_display(&session.snapshot(clock.now()));
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    debug!("[TIMER] Stop requested for project {}", session.project_id());
                    session.pause(clock.now());
                    break DriveOutcome::Stopped;
                }
            }
        }
    };
    on_display(&session.snapshot(clock.now()));
    outcome
}
