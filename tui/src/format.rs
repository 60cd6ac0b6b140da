//! Timestamp formatting
//!
//! Backend timestamps are epoch seconds (possibly fractional). Messages show
//! the local wall-clock time, conversations show the local date.

use chrono::{DateTime, Local, TimeZone, Utc};

fn to_local(timestamp: f64) -> Option<DateTime<Local>> {
    if !timestamp.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (timestamp * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|utc| utc.with_timezone(&Local))
}

/// `HH:MM` in local time, empty for unrepresentable timestamps
#[must_use]
pub fn message_time(timestamp: f64) -> String {
    to_local(timestamp)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// `dd/mm/yyyy` in local time, empty for unrepresentable timestamps
#[must_use]
pub fn conversation_date(timestamp: f64) -> String {
    to_local(timestamp)
        .map(|t| t.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_time_shape() {
        let text = message_time(1_714_000_000.5);
        assert_eq!(text.len(), 5);
        assert_eq!(&text[2..3], ":");
    }

    #[test]
    fn test_conversation_date_matches_local_calendar() {
        let ts = 1_714_000_000.0;
        let expected = Local
            .timestamp_opt(1_714_000_000, 0)
            .single()
            .unwrap()
            .format("%d/%m/%Y")
            .to_string();
        assert_eq!(conversation_date(ts), expected);
    }

    #[test]
    fn test_invalid_timestamps_render_empty() {
        assert_eq!(message_time(f64::NAN), "");
        assert_eq!(conversation_date(f64::INFINITY), "");
    }
}
