//! Wall-clock source. Timers never read the system time directly so that
//! tests can drive them deterministically.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        let step = Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX));
        // A poisoned lock only means another test thread panicked mid-advance;
        // the stored instant is still valid.
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += step;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Milliseconds from `earlier` to `later`, clamped at zero so a clock that
/// steps backwards never produces negative elapsed time.
pub fn millis_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    u64::try_from((later - earlier).num_milliseconds()).unwrap_or(0)
}

/// `instant + ms`, saturating at chrono's representable range.
pub fn plus_millis(instant: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    let step = Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX));
    instant.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `instant - ms`, saturating at chrono's representable range.
pub fn minus_millis(instant: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    let step = Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX));
    instant.checked_sub_signed(step).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances_shared_instant() {
        let clock = MockClock::new();
        let other = clock.clone();
        let start = clock.now();
        other.advance_ms(1500);
        assert_eq!(millis_between(start, clock.now()), 1500);
    }

    #[test]
    fn test_millis_between_clamps_backwards_steps() {
        let clock = MockClock::new();
        let later = plus_millis(clock.now(), 500);
        assert_eq!(millis_between(later, clock.now()), 0);
    }
}
