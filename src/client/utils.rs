//! Small helpers shared by the client modules.
//!
//! - Duration formatting for option values
//! - Status classification
//! - Relative path joining for multipart part names

use std::time::Duration;

/// Format a duration the way the daemon parses durations.
///
/// Whole units are spelled out (`1h2m3s`), fractional seconds keep only
/// significant digits (`1.5s`) and sub-second values use the largest unit
/// that keeps the integer part non-zero (`250ms`, `1.5µs`, `12ns`).
///
/// # Examples
///
/// ```
/// use ipfs_shell::client::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(3723)), "1h2m3s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
/// assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
/// assert_eq!(format_duration(Duration::ZERO), "0s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", with_fraction(nanos / 1_000, nanos % 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!(
            "{}ms",
            with_fraction(nanos / 1_000_000, nanos % 1_000_000, 6)
        );
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = with_fraction(
        u128::from(total_secs % 60),
        u128::from(duration.subsec_nanos()),
        9,
    );

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn with_fraction(whole: u128, remainder: u128, digits: usize) -> String {
    if remainder == 0 {
        return whole.to_string();
    }
    let fraction = format!("{remainder:0digits$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Check if a status code is a redirect the client must refuse.
pub fn is_redirect_status(status: u16) -> bool {
    (300..400).contains(&status)
}

/// Check if a status code carries a daemon error.
pub fn is_error_status(status: u16) -> bool {
    status >= 400
}

/// Join a multipart part name onto its parent's relative path.
pub fn join_part_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(Duration::from_nanos(12)), "12ns");
        assert_eq!(format_duration(Duration::from_nanos(1_500)), "1.5µs");
        assert_eq!(format_duration(Duration::from_micros(1_250)), "1.25ms");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_duration(Duration::from_secs(86400)), "24h0m0s");
    }

    #[test]
    fn test_status_classification() {
        assert!(is_redirect_status(301));
        assert!(is_redirect_status(307));
        assert!(!is_redirect_status(200));
        assert!(is_error_status(404));
        assert!(!is_error_status(399));
    }

    #[test]
    fn test_join_part_path() {
        assert_eq!(join_part_path("", "a"), "a");
        assert_eq!(join_part_path("dir/sub", "a.txt"), "dir/sub/a.txt");
    }
}
