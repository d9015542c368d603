use chrono::{DateTime, TimeZone, Utc};

/// Get the current time as a UTC datetime.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a token expiry value into a UTC datetime.
///
/// Supports:
/// - Second epoch as string (10-12 digits, e.g. `"1770526800"`)
/// - Millisecond epoch as string (13+ digits, e.g. `"1770526800000"`)
/// - RFC 3339 / ISO 8601 (e.g. `"2026-02-08T05:00:00.000Z"`)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();

    // Try RFC 3339 / ISO 8601
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Try numeric epoch
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        match trimmed.len() {
            13.. => {
                let ms = trimmed.parse::<i64>().ok()?;
                return Utc.timestamp_millis_opt(ms).single();
            }
            10..=12 => {
                let secs = trimmed.parse::<i64>().ok()?;
                return Utc.timestamp_opt(secs, 0).single();
            }
            _ => {}
        }
    }

    None
}

/// Format an age in seconds as fractional hours, e.g. `"3.2h"`.
pub fn format_age(seconds: i64) -> String {
    format!("{:.1}h", seconds as f64 / 3600.0)
}
