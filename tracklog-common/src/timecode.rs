//! Timecode parsing and formatting
//!
//! Recognition services report positions as colon-separated timecodes
//! (`"HH:MM:SS"`, `"MM:SS"` or bare `"SS"`), optionally as a `"start-end"`
//! range. Reports render absolute positions as `"MM:SS"` without an hour
//! component, so minutes may exceed 59 for long media.

/// Parse a colon-separated timecode into seconds.
///
/// Components are assigned right to left: the rightmost group is seconds,
/// the next minutes, the next hours. The seconds group may carry a fraction.
/// Returns `None` for empty input, more than three groups, or any group that
/// is not a non-negative number.
///
/// # Examples
///
/// ```
/// use tracklog_common::timecode::parse_timecode;
///
/// assert_eq!(parse_timecode("01:02:03"), Some(3723.0));
/// assert_eq!(parse_timecode("02:05"), Some(125.0));
/// assert_eq!(parse_timecode("45"), Some(45.0));
/// assert_eq!(parse_timecode("1:2:3:4"), None);
/// ```
pub fn parse_timecode(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let groups: Vec<&str> = text.split(':').collect();
    if groups.len() > 3 {
        return None;
    }

    let mut total = 0.0;
    for (position, group) in groups.iter().rev().enumerate() {
        let value: f64 = group.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total += value * 60f64.powi(position as i32);
    }

    Some(total)
}

/// Parse a `"start-end"` timecode range into `(start, end)` seconds.
///
/// Only the first `-` separates the two sides. Returns `None` when there is
/// no separator or either side fails [`parse_timecode`].
pub fn parse_timecode_range(text: &str) -> Option<(f64, f64)> {
    let (start, end) = text.split_once('-')?;
    Some((parse_timecode(start)?, parse_timecode(end)?))
}

/// Format seconds as zero-padded `"MM:SS"`.
///
/// `minutes = floor(seconds / 60)`, `secs = floor(seconds mod 60)`. Negative
/// or non-finite input renders as `"00:00"`.
///
/// ```
/// use tracklog_common::timecode::format_minutes_seconds;
///
/// assert_eq!(format_minutes_seconds(0.0), "00:00");
/// assert_eq!(format_minutes_seconds(125.9), "02:05");
/// assert_eq!(format_minutes_seconds(3723.0), "62:03");
/// ```
pub fn format_minutes_seconds(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{:02}:{:02}", minutes, secs)
}
