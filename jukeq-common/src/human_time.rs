//! Duration display formatting
//!
//! Queue entry durations are rendered as `HH:MM:SS` everywhere they are shown
//! or persisted (queue file lines, event payloads). Hours are zero-padded to
//! two digits but may grow beyond that for very long media.

use std::time::Duration;

/// Format a duration as `HH:MM:SS`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use jukeq_common::human_time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(0)), "00:00:00");
/// assert_eq!(format_duration(Duration::from_secs(75)), "00:01:15");
/// assert_eq!(format_duration(Duration::from_secs(3661)), "01:01:01");
/// ```
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let mins = (total / 60) % 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Parse a `HH:MM:SS` string back into a duration.
///
/// Returns `None` unless the string has exactly three colon-separated
/// numeric fields.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let mut parts = s.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let mins: u64 = parts.next()?.parse().ok()?;
    let secs: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + mins * 60 + secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_padding() {
        assert_eq!(format_duration(Duration::from_secs(5)), "00:00:05");
        assert_eq!(format_duration(Duration::from_secs(125)), "00:02:05");
        assert_eq!(format_duration(Duration::from_secs(7322)), "02:02:02");
    }

    #[test]
    fn hours_can_exceed_two_digits() {
        assert_eq!(format_duration(Duration::from_secs(360_000)), "100:00:00");
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert!(parse_duration("01:02").is_none());
        assert!(parse_duration("01:02:03:04").is_none());
        assert!(parse_duration("xx:02:03").is_none());
    }

    #[test]
    fn round_trip() {
        for secs in [0u64, 59, 60, 3599, 3600, 86399] {
            let d = Duration::from_secs(secs);
            assert_eq!(parse_duration(&format_duration(d)), Some(d));
        }
    }
}
