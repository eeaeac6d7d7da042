use super::{
    ActivityTimer, FlushAccumulator, FlushReason, PomodoroConfig, TimerSnapshot, TimerStep,
};
use crate::clock::Clock;
use crate::models::ActivityType;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where flushed time goes. Implemented by [`crate::Tracker`]; tests plug in
/// recorders.
pub trait FlushSink: Send + Sync {
    /// Adds `amount_ms` to today's bucket. `false` if the project is gone.
    fn bump_daily_session(&self, project_id: &str, activity: ActivityType, amount_ms: u64)
        -> bool;

    /// Best-effort remote copy. Must not block.
    fn mirror_aggregate_to_server(&self, project_id: &str, activity: ActivityType, amount_ms: u64);
}

/// One timer bound to one project for the lifetime of a tracking run.
///
/// Dropping a session that was not closed behaves like pausing it: buffered
/// time is flushed, never silently lost. Only [`TimerSession::reset`]
/// discards buffered time.
pub struct TimerSession {
    project_id: String,
    timer: ActivityTimer,
    accumulator: FlushAccumulator,
    sink: Arc<dyn FlushSink>,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl TimerSession {
    pub fn new(
        project_id: impl Into<String>,
        timer: impl Into<ActivityTimer>,
        threshold_ms: u64,
        sink: Arc<dyn FlushSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            timer: timer.into(),
            accumulator: FlushAccumulator::new(threshold_ms),
            sink,
            clock,
            closed: false,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn activity(&self) -> ActivityType {
        self.timer.activity()
    }

    pub fn timer(&self) -> &ActivityTimer {
        &self.timer
    }

    pub fn buffered_ms(&self) -> u64 {
        self.accumulator.buffered_ms()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.timer.is_finished()
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.closed {
            warn!("[TIMER] Start on a closed session for project {}", self.project_id);
            return false;
        }
        let started = self.timer.start(now);
        if started {
            info!(
                "[TIMER] {} started for project {}",
                self.timer.activity(),
                self.project_id
            );
        }
        started
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        self.start(now)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) {
        let steps = self.timer.tick(now);
        self.apply(steps);
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        let steps = self.timer.pause(now);
        if !steps.is_empty() {
            info!("[TIMER] {} paused for project {}", self.timer.activity(), self.project_id);
        }
        self.apply(steps);
    }

    /// Back to the initial state. Buffered, not yet flushed time is dropped;
    /// time already flushed stays in the store.
    pub fn reset(&mut self) {
        self.timer.reset();
        let lost = self.accumulator.discard();
        info!(
            "[TIMER] {} reset for project {} ({}ms unflushed time discarded)",
            self.timer.activity(),
            self.project_id,
            lost
        );
    }

    /// Replaces the pomodoro configuration. Always resets, so buffered time
    /// is discarded like [`TimerSession::reset`]. Ignored for other timers.
    pub fn configure_pomodoro(&mut self, config: PomodoroConfig) -> bool {
        let ActivityTimer::Pomodoro(p) = &mut self.timer else {
            return false;
        };
        p.configure(config);
        self.accumulator.discard();
        true
    }

    /// New countdown length; resets the countdown. Ignored for other timers.
    pub fn set_countdown_duration(&mut self, duration_ms: u64) -> bool {
        let ActivityTimer::Countdown(c) = &mut self.timer else {
            return false;
        };
        c.set_duration(duration_ms);
        self.accumulator.discard();
        true
    }

    /// Ends the session: pauses a running timer and flushes everything
    /// buffered. Safe to call more than once.
    pub fn close(&mut self, now: DateTime<Utc>) {
        if self.closed {
            return;
        }
        let steps = self.timer.pause(now);
        self.apply(steps);
        self.forced_flush(FlushReason::Stop);
        self.closed = true;
        debug!("[TIMER] Session closed for project {}", self.project_id);
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        self.timer.snapshot(now)
    }

    fn apply(&mut self, steps: Vec<TimerStep>) {
        for step in steps {
            match step {
                TimerStep::Tracked(delta) => {
                    for chunk in self.accumulator.push(delta) {
                        debug!("[FLUSH] Threshold flush {}ms", chunk);
                        self.bump(chunk);
                    }
                }
                TimerStep::Boundary(reason) => self.forced_flush(reason),
            }
        }
    }

    fn forced_flush(&mut self, reason: FlushReason) {
        if let Some(rest) = self.accumulator.force_flush() {
            debug!("[FLUSH] Forced flush {}ms ({:?})", rest, reason);
            self.bump(rest);
        }
        let run_total = self.accumulator.take_run_total();
        if run_total > 0 {
            self.sink
                .mirror_aggregate_to_server(&self.project_id, self.timer.activity(), run_total);
        }
    }

    fn bump(&self, amount_ms: u64) {
        if !self
            .sink
            .bump_daily_session(&self.project_id, self.timer.activity(), amount_ms)
        {
            warn!(
                "[FLUSH] Project {} not found, {}ms not recorded",
                self.project_id, amount_ms
            );
        }
    }
}

impl Drop for TimerSession {
    fn drop(&mut self) {
        if !self.closed {
            let now = self.clock.now();
            self.close(now);
        }
    }
}
