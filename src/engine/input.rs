//! Lenient parsing of user-entered timer settings. Anything unparseable or
//! out of range falls back to the smallest valid value.

pub const MIN_FOCUS_MINUTES: u64 = 1;
pub const MIN_COUNTDOWN_MINUTES: u64 = 1;
pub const MIN_CYCLES: u32 = 1;

fn parse_non_negative(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<u64>() {
        return Some(v);
    }
    // Accept "2.5" style input by truncating; reject negatives and NaN.
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v.trunc() as u64),
        _ => None,
    }
}

fn at_least(raw: &str, min: u64) -> u64 {
    parse_non_negative(raw).map_or(min, |v| v.max(min))
}

/// Countdown or focus length in minutes, at least 1.
pub fn parse_minutes(raw: &str) -> u64 {
    at_least(raw, MIN_COUNTDOWN_MINUTES)
}

/// Break length in minutes. Zero is allowed and disables the break.
pub fn parse_break_minutes(raw: &str) -> u64 {
    at_least(raw, 0)
}

pub fn parse_cycles(raw: &str) -> u32 {
    let v = at_least(raw, u64::from(MIN_CYCLES));
    clamp_cycles(u32::try_from(v).unwrap_or(u32::MAX))
}

pub fn clamp_cycles(cycles: u32) -> u32 {
    cycles.max(MIN_CYCLES)
}

/// Hours/minutes/seconds fields of a countdown, each clamped at zero.
pub fn hms_to_ms(hours: &str, minutes: &str, seconds: &str) -> u64 {
    let h = at_least(hours, 0);
    let m = at_least(minutes, 0);
    let s = at_least(seconds, 0);
    h.saturating_mul(3600)
        .saturating_add(m.saturating_mul(60))
        .saturating_add(s)
        .saturating_mul(1000)
}

/// Countdown length from a minutes field, at least one minute.
pub fn minutes_to_ms(minutes: &str) -> u64 {
    parse_minutes(minutes).saturating_mul(60 * 1000)
}
