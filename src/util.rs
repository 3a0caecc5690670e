// Utility helpers for parsing and number formatting.
//
// The dashboard exports carry numbers as text, sometimes empty, sometimes
// junk. Everything here degrades to 0 instead of failing so the engine can
// assume clean `f64` values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use serde_json::Value;

/// Parse the leading numeric prefix of a string, the way a permissive
/// float parse does: `"45.6"` → 45.6, `"12abc"` → 12, `"abc"` → 0.
///
/// Leading/trailing whitespace is ignored. Non-finite results become 0.
pub fn parse_lenient(s: &str) -> f64 {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut end = 0usize;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    // Optional exponent, only taken when it has digits.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    finite_or_zero(s[..end].parse::<f64>().unwrap_or(0.0))
}

/// Lenient numeric read of an optional JSON value: strings go through
/// [`parse_lenient`], numbers are taken as is, everything else is 0.
///
/// The second element reports whether the value had to be zeroed.
pub fn number_from_json(v: Option<&Value>) -> (f64, bool) {
    match v {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(x) if x.is_finite() => (x, false),
            _ => (0.0, true),
        },
        Some(Value::String(s)) => {
            let x = parse_lenient(s);
            // "0" and "0.0" are real zeroes, not coercions.
            let zeroed = x == 0.0 && !looks_like_zero(s);
            (x, zeroed)
        }
        _ => (0.0, true),
    }
}

fn looks_like_zero(s: &str) -> bool {
    let s = s.trim().trim_start_matches(['+', '-']);
    !s.is_empty() && s.chars().any(|c| c == '0') && s.chars().all(|c| c == '0' || c == '.')
}

pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    finite_or_zero(part / whole * 100.0)
}

/// Render a dashboard amount with a fixed number of decimals and English
/// thousands separators, e.g. `1,234,567.89`.
///
/// - Non-finite input renders as zero, like every other numeric guard here.
/// - A value that rounds to zero never keeps a minus sign (`-0.001` → `0.00`).
/// - The integer part goes through `num-format`, so it is grouped exactly
///   the way [`format_int`] groups counts.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, finite_or_zero(n).abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let grouped = int_part
        .parse::<u64>()
        .map(|v| v.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());
    let rounds_to_zero = fixed.bytes().all(|b| b == b'0' || b == b'.');
    let sign = if n < 0.0 && !rounds_to_zero { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

/// Thousands-separated counts for console messages (`9,855 rows read`).
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Text view of a loose JSON field: strings are trimmed, numbers keep their
/// JSON spelling, and anything else (null, bools, arrays) is empty.
pub fn text_from_json(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Parse a `YYYY-MM-DD` date. Longer timestamps (`2024-03-05T10:00:00`)
/// are cut to their date part first.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
