use super::{FlushReason, TimerSnapshot, TimerStatus, TimerStep};
use crate::clock::{millis_between, minus_millis};
use chrono::{DateTime, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
enum StopwatchState {
    Idle,
    /// `anchor` is chosen so that `now - anchor` is the total elapsed time,
    /// including segments before the last pause.
    Running {
        anchor: DateTime<Utc>,
    },
    Paused,
}

/// Counts up from zero. Pausing keeps the elapsed total; resuming continues
/// from it.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    state: StopwatchState,
    /// Elapsed time folded at the last pause.
    elapsed_ms: u64,
    /// Elapsed time already reported as tracked.
    reported_ms: u64,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            state: StopwatchState::Idle,
            elapsed_ms: 0,
            reported_ms: 0,
        }
    }

    /// Idle → Running or Paused → Running.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            StopwatchState::Idle | StopwatchState::Paused => {
                self.state = StopwatchState::Running {
                    anchor: minus_millis(now, self.elapsed_ms),
                };
                self.reported_ms = self.elapsed_ms;
                true
            }
            StopwatchState::Running { .. } => {
                warn!("[TIMER] Invalid transition: Running → Running (stopwatch already running)");
                false
            }
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        let StopwatchState::Running { anchor } = self.state else {
            return Vec::new();
        };
        let elapsed = millis_between(anchor, now);
        // A backwards clock step must not un-report time.
        let delta = elapsed.saturating_sub(self.reported_ms);
        self.reported_ms = self.reported_ms.max(elapsed);
        if delta == 0 {
            Vec::new()
        } else {
            vec![TimerStep::Tracked(delta)]
        }
    }

    /// Running → Paused. Folds the final segment and asks for a forced flush.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        if !self.is_running() {
            return Vec::new();
        }
        let mut steps = self.tick(now);
        self.elapsed_ms = self.reported_ms;
        self.state = StopwatchState::Paused;
        steps.push(TimerStep::Boundary(FlushReason::Pause));
        steps
    }

    /// Back to idle at zero. Does not flush.
    pub fn reset(&mut self) {
        self.state = StopwatchState::Idle;
        self.elapsed_ms = 0;
        self.reported_ms = 0;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, StopwatchState::Running { .. })
    }

    pub fn status(&self) -> TimerStatus {
        match self.state {
            StopwatchState::Idle => TimerStatus::Idle,
            StopwatchState::Running { .. } => TimerStatus::Running,
            StopwatchState::Paused => TimerStatus::Paused,
        }
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            StopwatchState::Running { anchor } => millis_between(anchor, now).max(self.reported_ms),
            _ => self.elapsed_ms,
        }
    }

    /// The anchor of the running segment: `now - anchor` is the total elapsed.
    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        match self.state {
            StopwatchState::Running { anchor } => Some(anchor),
            _ => None,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        TimerSnapshot::stopwatch(self.status(), self.running_since(), self.elapsed_ms(now))
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
