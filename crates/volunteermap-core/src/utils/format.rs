use std::fmt::Display;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike};

const BYTE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Format a byte count using 1024-based units: `1536` -> `"1.5 KB"`.
/// Trailing zeros are dropped, so `1024` renders as `"1 KB"`.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut unit = 1_u64;
    while exponent + 1 < BYTE_UNITS.len() && bytes / unit >= 1024 {
        unit *= 1024;
        exponent += 1;
    }

    let scaled = bytes as f64 / unit as f64;
    let mut number = format!("{:.*}", decimals, scaled);
    if number.contains('.') {
        number = number.trim_end_matches('0').trim_end_matches('.').to_string();
    }

    format!("{} {}", number, BYTE_UNITS[exponent])
}

/// 12-hour clock time: "9:05 AM", "12:30 PM"
pub fn format_ampm<Tz>(dt: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dt.format("%-I:%M %p").to_string()
}

/// Date in the "Fri Oct 20 2023" form used on event cards
pub fn format_event_date<Tz>(dt: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dt.format("%a %b %d %Y").to_string()
}

pub fn add_hours<Tz: TimeZone>(dt: DateTime<Tz>, hours: i64) -> DateTime<Tz> {
    dt + Duration::hours(hours)
}

/// Keep the calendar date of `date` and take hour and minute from `time`.
/// Seconds are zeroed. Returns `None` when the resulting local time does not
/// exist in the date's time zone (DST gaps).
pub fn update_date_with_new_time<Tz: TimeZone>(
    date: &DateTime<Tz>,
    time: NaiveTime,
) -> Option<DateTime<Tz>> {
    let naive = date
        .date_naive()
        .and_hms_opt(time.hour(), time.minute(), 0)?;
    date.timezone().from_local_datetime(&naive).single()
}

/// Parse a numeric form field. Blank or non-numeric input yields `None`.
pub fn parse_count(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

/// Format a phone number for display
/// Handles various input formats and normalizes to (XXX) XXX-XXXX
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!(
            "({}) {}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..10]
        ),
        11 if digits.starts_with('1') => format!(
            "({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..11]
        ),
        _ => phone.to_string(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
