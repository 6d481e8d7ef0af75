//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whole seconds elapsed since `start`, saturating at zero and `u32::MAX`
pub fn uptime_seconds(start: DateTime<Utc>) -> u32 {
    let secs = (now() - start).num_seconds().max(0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Format a duration given in milliseconds as `MM:SS` or `H:MM:SS`
///
/// Rounds to the nearest second.
pub fn format_time(duration_ms: u64, use_hours: bool) -> String {
    let total_sec = duration_ms.saturating_add(500) / 1000;
    let min = total_sec / 60;
    let sec = total_sec % 60;

    if use_hours {
        format!("{}:{:02}:{:02}", min / 60, min % 60, sec)
    } else {
        format!("{:02}:{:02}", min, sec)
    }
}
