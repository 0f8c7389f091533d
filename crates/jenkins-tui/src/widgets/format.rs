//! Human-friendly durations and timestamps.

use chrono::{DateTime, Local, TimeZone, Utc};

/// `< 1s`, `42s`, `3m 5s`, `2h 10m`.
pub fn format_duration(ms: i64) -> String {
    if ms < 1_000 {
        return "< 1s".into();
    }
    let secs = ms / 1_000;
    let (h, m, s) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

/// Relative age of an epoch-millisecond timestamp, e.g. `5m ago`.
/// Zero or negative timestamps render as `-`.
pub fn time_ago(timestamp_ms: i64, now: DateTime<Utc>) -> String {
    if timestamp_ms <= 0 {
        return "-".into();
    }
    let Some(then) = Utc.timestamp_millis_opt(timestamp_ms).single() else {
        return "-".into();
    };
    let secs = (now - then).num_seconds();
    match secs {
        s if s < 60 => "just now".into(),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// Local wall-clock time of an epoch-millisecond timestamp.
pub fn local_time(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .filter(|_| timestamp_ms > 0)
        .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Text progress bar, `width` cells wide.
pub fn progress_bar(percent: u8, width: usize) -> String {
    let filled = usize::from(percent.min(100)) * width / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Truncate to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}
