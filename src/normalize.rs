// src/normalize.rs
//! Field canonicalization for state codes, ZIP codes and dates of birth.
//! All functions are total: bad input yields an empty string or `None`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

/// Trim, uppercase, keep the first two characters.
pub fn normalize_state(v: &str) -> String {
    v.trim().to_uppercase().chars().take(2).collect()
}

/// Digits only; 5-digit ZIP verbatim, longer input becomes ZIP+4.
pub fn normalize_zip(v: &str) -> String {
    let digits: String = v.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 5 {
        return digits;
    }
    let plus4_end = digits.len().min(9);
    format!("{}-{}", &digits[..5], &digits[5..plus4_end])
}

fn re_iso() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid iso regex"))
}

fn re_us_slash() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("valid slash regex"))
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a %b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Canonical ISO `YYYY-MM-DD`, or empty when nothing parses.
pub fn normalize_dob(v: &str) -> String {
    let raw = v.trim();
    if raw.is_empty() {
        return String::new();
    }
    if re_iso().is_match(raw) {
        return raw.to_string();
    }
    if let Some(caps) = re_us_slash().captures(raw) {
        return format!("{}-{:0>2}-{:0>2}", &caps[3], &caps[1], &caps[2]);
    }
    parse_general_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_general_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        })
}

/// Whole years between `dob` (ISO) and `today`; `None` when unknown.
pub fn age(dob: &str, today: NaiveDate) -> Option<i32> {
    let birth = NaiveDate::parse_from_str(dob.trim(), "%Y-%m-%d").ok()?;
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    Some(years)
}
