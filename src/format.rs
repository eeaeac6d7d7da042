//! Display formatting for tracked durations.

/// `HH:MM:SS`, zero padded. Hours are not wrapped at 24 so multi-day totals
/// stay readable. Sub-second remainders are truncated.
pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Short form for tight spaces: `MM:SS` under an hour, `Hh MMm` above.
pub fn format_compact(ms: u64) -> String {
    let total_seconds = ms / 1000;
    if total_seconds < 3600 {
        return format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60);
    }
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    format!("{}h {:02}m", h, m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_pads_fields() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(999), "00:00:00");
        assert_eq!(format_duration(10_450), "00:00:10");
        assert_eq!(format_duration(3_661_000), "01:01:01");
    }

    #[test]
    fn test_format_duration_does_not_wrap_days() {
        assert_eq!(format_duration(100 * 3600 * 1000), "100:00:00");
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(65_000), "01:05");
        assert_eq!(format_compact(59 * 60 * 1000 + 59_000), "59:59");
        assert_eq!(format_compact(3600 * 1000 + 5 * 60 * 1000), "1h 05m");
    }
}
