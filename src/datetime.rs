//! Timestamp helpers for chat messages.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Format used in front of every chat line.
pub const TIMESTAMP_FORMAT: &str = "%H:%M";

/// Format a UTC instant as `HH:MM` in the given timezone.
///
/// Unknown timezone names fall back to UTC.
pub fn format_timestamp(dt: &DateTime<Utc>, timezone: &str) -> String {
    match timezone.parse::<Tz>() {
        Ok(tz) => dt.with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string(),
        Err(_) => dt.format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Current wall-clock time as `HH:MM` in the given timezone.
pub fn now_timestamp(timezone: &str) -> String {
    format_timestamp(&Utc::now(), timezone)
}
