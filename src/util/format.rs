//! Human-readable formatting for counts, sizes and ages.

use chrono::{DateTime, Utc};

/// Bytes per megabyte.
pub const MB: f64 = 1024.0 * 1024.0;

/// Bytes as fractional megabytes.
#[inline]
pub fn mb(bytes: u64) -> f64 {
    bytes as f64 / MB
}

/// Format a count with comma thousands separators.
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format how long ago a timestamp was, or "never".
pub fn format_time_since(t: Option<DateTime<Utc>>) -> String {
    let Some(t) = t else {
        return "never".to_string();
    };
    let minutes = (Utc::now() - t).num_minutes().max(0);
    if minutes < 60 {
        return format!("{minutes} min ago");
    }
    let hours = minutes as f64 / 60.0;
    if hours < 24.0 {
        return format!("{hours:.1} hours ago");
    }
    format!("{:.1} days ago ({})", hours / 24.0, t.format("%Y-%m-%d"))
}

/// Format a duration in milliseconds as a human-readable age.
pub fn format_age(ms: i64) -> String {
    let minutes = ms / 60_000;
    if minutes < 60 {
        return format!("{minutes} min");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours} hours");
    }
    format!("{} days", hours / 24)
}

/// Format a millisecond duration compactly ("1.2s", "340ms").
pub fn format_duration_ms(ms: i64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(format_count(-4_500), "-4,500");
    }

    #[test]
    fn test_format_time_since_never() {
        assert_eq!(format_time_since(None), "never");
    }

    #[test]
    fn test_format_time_since_minutes() {
        let t = Utc::now() - Duration::minutes(5);
        assert_eq!(format_time_since(Some(t)), "5 min ago");
    }

    #[test]
    fn test_format_time_since_days_includes_date() {
        let t = Utc::now() - Duration::days(3);
        let s = format_time_since(Some(t));
        assert!(s.contains("days ago"), "got {s}");
        assert!(s.contains(&t.format("%Y-%m-%d").to_string()));
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(30 * 60_000), "30 min");
        assert_eq!(format_age(5 * 3_600_000), "5 hours");
        assert_eq!(format_age(49 * 3_600_000), "2 days");
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(340), "340ms");
        assert_eq!(format_duration_ms(1_250), "1.2s");
    }

    #[test]
    fn test_mb() {
        assert_eq!(mb(1_048_576), 1.0);
    }
}
