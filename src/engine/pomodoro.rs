use super::input::{clamp_cycles, MIN_FOCUS_MINUTES};
use super::{FlushReason, TimerSnapshot, TimerStatus, TimerStep};
use crate::clock::{millis_between, plus_millis};
use crate::format::format_duration;
use crate::models::ActivityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const MINUTE_MS: u64 = 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PomodoroPhase {
    Focus,
    Break,
}

/// Always clamped: every constructor, deserialization included, goes
/// through [`PomodoroConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPomodoroConfig")]
pub struct PomodoroConfig {
    focus_minutes: u64,
    /// Zero skips the break phase entirely.
    break_minutes: u64,
    cycles: u32,
}

#[derive(Deserialize)]
struct RawPomodoroConfig {
    #[serde(default)]
    focus_minutes: u64,
    #[serde(default)]
    break_minutes: u64,
    #[serde(default)]
    cycles: u32,
}

impl From<RawPomodoroConfig> for PomodoroConfig {
    fn from(raw: RawPomodoroConfig) -> Self {
        Self::new(raw.focus_minutes, raw.break_minutes, raw.cycles)
    }
}

impl PomodoroConfig {
    /// Out-of-range values are raised to the nearest valid one.
    pub fn new(focus_minutes: u64, break_minutes: u64, cycles: u32) -> Self {
        Self {
            focus_minutes: focus_minutes.max(MIN_FOCUS_MINUTES),
            break_minutes,
            cycles: clamp_cycles(cycles),
        }
    }

    pub fn focus_minutes(&self) -> u64 {
        self.focus_minutes
    }

    pub fn break_minutes(&self) -> u64 {
        self.break_minutes
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn focus_ms(&self) -> u64 {
        self.focus_minutes.saturating_mul(MINUTE_MS)
    }

    pub fn break_ms(&self) -> u64 {
        self.break_minutes.saturating_mul(MINUTE_MS)
    }
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self::new(25, 5, 1)
    }
}

#[derive(Debug, Clone)]
enum PomodoroState {
    Idle,
    Running {
        anchor: DateTime<Utc>,
        target: DateTime<Utc>,
    },
}

/// Focus/break cycles that chain automatically until the configured number
/// of cycles is complete. Both phases are tracked; each phase ends with a
/// forced flush.
#[derive(Debug, Clone)]
pub struct Pomodoro {
    config: PomodoroConfig,
    state: PomodoroState,
    phase: PomodoroPhase,
    remaining_ms: u64,
    completed_cycles: u32,
}

impl Pomodoro {
    pub fn new(config: PomodoroConfig) -> Self {
        Self {
            config,
            state: PomodoroState::Idle,
            phase: PomodoroPhase::Focus,
            remaining_ms: config.focus_ms(),
            completed_cycles: 0,
        }
    }

    pub fn config(&self) -> PomodoroConfig {
        self.config
    }

    /// Applies a new configuration. Always a full reset, even mid-run.
    pub fn configure(&mut self, config: PomodoroConfig) {
        if self.is_running() {
            info!("[TIMER] Pomodoro reconfigured while running, resetting");
        }
        self.config = config;
        self.reset();
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_running() {
            warn!("[TIMER] Invalid transition: Running → Running (pomodoro already running)");
            return false;
        }
        if self.is_complete() {
            debug!("[TIMER] All pomodoro cycles done, start ignored until reset");
            return false;
        }
        self.state = PomodoroState::Running {
            anchor: now,
            target: plus_millis(now, self.remaining_ms),
        };
        true
    }

    /// Advances through as many phase boundaries as `now` has passed. Each
    /// new phase is anchored at the previous phase's target, not at `now`,
    /// so a late tick never shifts the schedule.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        let mut steps = Vec::new();
        while let PomodoroState::Running { target, .. } = self.state {
            let left = millis_between(now, target);
            let delta = self.remaining_ms.saturating_sub(left);
            self.remaining_ms -= delta;
            if delta > 0 {
                steps.push(TimerStep::Tracked(delta));
            }
            if self.remaining_ms > 0 {
                break;
            }
            self.finish_phase(target, &mut steps);
        }
        steps
    }

    fn finish_phase(&mut self, ended_at: DateTime<Utc>, steps: &mut Vec<TimerStep>) {
        match self.phase {
            PomodoroPhase::Focus => {
                steps.push(TimerStep::Boundary(FlushReason::PhaseComplete));
                let break_ms = self.config.break_ms();
                if break_ms > 0 {
                    debug!("[TIMER] Focus phase complete, starting break");
                    self.enter_phase(PomodoroPhase::Break, break_ms, ended_at);
                } else {
                    self.complete_cycle(ended_at, steps);
                }
            }
            PomodoroPhase::Break => {
                steps.push(TimerStep::Boundary(FlushReason::PhaseComplete));
                self.complete_cycle(ended_at, steps);
            }
        }
    }

    fn complete_cycle(&mut self, ended_at: DateTime<Utc>, steps: &mut Vec<TimerStep>) {
        self.completed_cycles = self.completed_cycles.saturating_add(1);
        if self.completed_cycles >= self.config.cycles {
            info!(
                "[TIMER] Pomodoro finished: {}/{} cycles",
                self.completed_cycles, self.config.cycles
            );
            self.phase = PomodoroPhase::Focus;
            self.remaining_ms = self.config.focus_ms();
            self.state = PomodoroState::Idle;
            steps.push(TimerStep::Boundary(FlushReason::Completed));
        } else {
            debug!(
                "[TIMER] Cycle {}/{} complete, next focus phase",
                self.completed_cycles, self.config.cycles
            );
            self.enter_phase(PomodoroPhase::Focus, self.config.focus_ms(), ended_at);
        }
    }

    fn enter_phase(&mut self, phase: PomodoroPhase, duration_ms: u64, anchor: DateTime<Utc>) {
        self.phase = phase;
        self.remaining_ms = duration_ms;
        self.state = PomodoroState::Running {
            anchor,
            target: plus_millis(anchor, duration_ms),
        };
    }

    /// Running → Idle, keeping phase and remaining time.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Vec<TimerStep> {
        if !self.is_running() {
            return Vec::new();
        }
        let mut steps = self.tick(now);
        if self.is_running() {
            self.state = PomodoroState::Idle;
            steps.push(TimerStep::Boundary(FlushReason::Pause));
        }
        steps
    }

    /// Idle, focus phase, zero cycles. Does not flush.
    pub fn reset(&mut self) {
        self.state = PomodoroState::Idle;
        self.phase = PomodoroPhase::Focus;
        self.remaining_ms = self.config.focus_ms();
        self.completed_cycles = 0;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PomodoroState::Running { .. })
    }

    pub fn is_complete(&self) -> bool {
        !self.is_running() && self.completed_cycles >= self.config.cycles
    }

    pub fn phase(&self) -> PomodoroPhase {
        self.phase
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn status(&self) -> TimerStatus {
        if self.is_running() {
            TimerStatus::Running
        } else {
            TimerStatus::Idle
        }
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            PomodoroState::Running { target, .. } => {
                millis_between(now, target).min(self.remaining_ms)
            }
            PomodoroState::Idle => self.remaining_ms,
        }
    }

    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        match self.state {
            PomodoroState::Running { anchor, .. } => Some(anchor),
            PomodoroState::Idle => None,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let remaining = self.remaining_ms(now);
        let phase_total = match self.phase {
            PomodoroPhase::Focus => self.config.focus_ms(),
            PomodoroPhase::Break => self.config.break_ms(),
        };
        TimerSnapshot {
            activity: ActivityType::Pomodoro,
            status: self.status(),
            running_since: self.running_since(),
            elapsed_ms: phase_total.saturating_sub(remaining),
            remaining_ms: Some(remaining),
            phase: Some(self.phase),
            completed_cycles: Some(self.completed_cycles),
            target_cycles: Some(self.config.cycles),
            display: format_duration(remaining),
        }
    }
}

impl Default for Pomodoro {
    fn default() -> Self {
        Self::new(PomodoroConfig::default())
    }
}
