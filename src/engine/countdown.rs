use super::{FlushReason, TimerSnapshot, TimerStatus, TimerStep};
use crate::clock::{millis_between, plus_millis};
use crate::format::format_duration;
use crate::models::ActivityType;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum CountdownState {
    /// Not started, or paused with `remaining_ms` preserved.
    Idle,
    Running {
        anchor: DateTime<Utc>,
        target: DateTime<Utc>,
    },
    Expired,
}

/// Counts down from a configured duration. Remaining time is always derived
/// from `target - now`, never from the number of ticks seen.
#[derive(Debug, Clone)]
pub struct Countdown {
    state: CountdownState,
    duration_ms: u64,
    remaining_ms: u64,
}

impl Countdown {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            state: CountdownState::Idle,
            duration_ms,
            remaining_ms: duration_ms,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Replaces the configured duration and resets. Nothing is flushed.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
        self.reset();
    }

    /// Idle → Running. Refused when there is nothing left to count down,
    /// which covers both a zero configuration and an expired timer.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CountdownState::Running { .. } => {
                warn!("[TIMER] Invalid transition: Running → Running (countdown already running)");
                false
            }
            CountdownState::Expired => {
                debug!("[TIMER] Countdown already expired, start ignored until reset");
                false
            }
            CountdownState::Idle if self.remaining_ms == 0 => {
                debug!("[TIMER] Countdown has no remaining time, start ignored");
                false
            }
            CountdownState::Idle => {
                self.state = CountdownState::Running {
                    anchor: now,
                    target: plus_millis(now, self.remaining_ms),
                };
                true
            }
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        let CountdownState::Running { target, .. } = self.state else {
            return Vec::new();
        };
        let left = millis_between(now, target);
        let mut steps = Vec::new();
        // `left` can only grow if the clock stepped backwards; count nothing then.
        let delta = self.remaining_ms.saturating_sub(left);
        if delta > 0 {
            self.remaining_ms -= delta;
            steps.push(TimerStep::Tracked(delta));
        }
        if self.remaining_ms == 0 {
            self.state = CountdownState::Expired;
            steps.push(TimerStep::Boundary(FlushReason::Expired));
        }
        steps
    }

    /// Running → Idle with the remaining time preserved.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        if !self.is_running() {
            return Vec::new();
        }
        let mut steps = self.tick(now);
        if self.is_running() {
            self.state = CountdownState::Idle;
            steps.push(TimerStep::Boundary(FlushReason::Pause));
        }
        steps
    }

    /// Back to the configured duration. Does not flush.
    pub fn reset(&mut self) {
        self.state = CountdownState::Idle;
        self.remaining_ms = self.duration_ms;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, CountdownState::Running { .. })
    }

    pub fn status(&self) -> TimerStatus {
        match self.state {
            CountdownState::Idle => TimerStatus::Idle,
            CountdownState::Running { .. } => TimerStatus::Running,
            CountdownState::Expired => TimerStatus::Expired,
        }
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            CountdownState::Running { target, .. } => {
                millis_between(now, target).min(self.remaining_ms)
            }
            _ => self.remaining_ms,
        }
    }

    /// Start of the current run segment.
    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        match self.state {
            CountdownState::Running { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let remaining = self.remaining_ms(now);
        TimerSnapshot {
            activity: ActivityType::Countdown,
            status: self.status(),
            running_since: self.running_since(),
            elapsed_ms: self.duration_ms.saturating_sub(remaining),
            remaining_ms: Some(remaining),
            phase: None,
            completed_cycles: None,
            target_cycles: None,
            display: format_duration(remaining),
        }
    }
}
