//! Activity timers and the flush pipeline they feed.
//!
//! Timers are pure state machines driven by explicit `now` instants. They
//! report tracked time as a list of [`TimerStep`]s; [`TimerSession`] turns
//! those steps into chunked flushes against a [`FlushSink`].

mod accumulator;
mod countdown;
pub mod input;
mod pomodoro;
mod session;
mod stopwatch;

pub use accumulator::{FlushAccumulator, DEFAULT_FLUSH_THRESHOLD_MS};
pub use countdown::Countdown;
pub use pomodoro::{Pomodoro, PomodoroConfig, PomodoroPhase};
pub use session::{FlushSink, TimerSession};
pub use stopwatch::Stopwatch;

use crate::format::format_duration;
use crate::models::ActivityType;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coarse run state shared by all timer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Expired,
}

/// Why a forced flush happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    Pause,
    Expired,
    PhaseComplete,
    Completed,
    Stop,
}

/// Output of advancing a timer. Steps are applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStep {
    /// Time that counts towards the project's aggregate.
    Tracked(u64),
    /// A point where buffered time must be drained.
    Boundary(FlushReason),
}

/// Read-only view for display refreshes. Building one never advances the
/// timer or touches the accumulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub activity: ActivityType,
    pub status: TimerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_since: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<PomodoroPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_cycles: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_cycles: Option<u32>,
    pub display: String,
}

impl TimerSnapshot {
    fn stopwatch(
        status: TimerStatus,
        running_since: Option<DateTime<Utc>>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            activity: ActivityType::Stopwatch,
            status,
            running_since,
            elapsed_ms,
            remaining_ms: None,
            phase: None,
            completed_cycles: None,
            target_cycles: None,
            display: format_duration(elapsed_ms),
        }
    }
}

/// The three timing disciplines behind one interface.
#[derive(Debug, Clone)]
pub enum ActivityTimer {
    Stopwatch(Stopwatch),
    Countdown(Countdown),
    Pomodoro(Pomodoro),
}

impl ActivityTimer {
    pub fn activity(&self) -> ActivityType {
        match self {
            ActivityTimer::Stopwatch(_) => ActivityType::Stopwatch,
            ActivityTimer::Countdown(_) => ActivityType::Countdown,
            ActivityTimer::Pomodoro(_) => ActivityType::Pomodoro,
        }
    }

    /// Returns `false` when the transition is refused (already running,
    /// nothing left to count down, all cycles done).
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self {
            ActivityTimer::Stopwatch(t) => t.start(now),
            ActivityTimer::Countdown(t) => t.start(now),
            ActivityTimer::Pomodoro(t) => t.start(now),
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        match self {
            ActivityTimer::Stopwatch(t) => t.tick(now),
            ActivityTimer::Countdown(t) => t.tick(now),
            ActivityTimer::Pomodoro(t) => t.tick(now),
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        match self {
            ActivityTimer::Stopwatch(t) => t.pause(now),
            ActivityTimer::Countdown(t) => t.pause(now),
            ActivityTimer::Pomodoro(t) => t.pause(now),
        }
    }

    pub fn reset(&mut self) {
        match self {
            ActivityTimer::Stopwatch(t) => t.reset(),
            ActivityTimer::Countdown(t) => t.reset(),
            ActivityTimer::Pomodoro(t) => t.reset(),
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            ActivityTimer::Stopwatch(t) => t.is_running(),
            ActivityTimer::Countdown(t) => t.is_running(),
            ActivityTimer::Pomodoro(t) => t.is_running(),
        }
    }

    /// Ran to its natural end. A stopwatch never finishes on its own.
    pub fn is_finished(&self) -> bool {
        match self {
            ActivityTimer::Stopwatch(_) => false,
            ActivityTimer::Countdown(t) => t.status() == TimerStatus::Expired,
            ActivityTimer::Pomodoro(t) => t.is_complete(),
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        match self {
            ActivityTimer::Stopwatch(t) => t.snapshot(now),
            ActivityTimer::Countdown(t) => t.snapshot(now),
            ActivityTimer::Pomodoro(t) => t.snapshot(now),
        }
    }
}

impl From<Stopwatch> for ActivityTimer {
    fn from(t: Stopwatch) -> Self {
        ActivityTimer::Stopwatch(t)
    }
}

impl From<Countdown> for ActivityTimer {
    fn from(t: Countdown) -> Self {
        ActivityTimer::Countdown(t)
    }
}

impl From<Pomodoro> for ActivityTimer {
    fn from(t: Pomodoro) -> Self {
        ActivityTimer::Pomodoro(t)
    }
}
