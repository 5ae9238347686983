//! Shared helpers for parsing `vars`/payload [`Value`]s and building response
//! [`Value`]s, used across every handler module.

use bbs_core::Value;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// Split `path` at its first `/`, returning the remainder if present.
///
/// `"bulletin/5"` yields `Some("5")`; `"bulletin"` and `""` yield `None`.
pub fn path_tail(path: &str) -> Option<&str> {
    path.split_once('/').map(|(_, rest)| rest)
}

/// Borrow a string-valued var.
pub fn var_str<'a>(vars: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a str> {
    vars.get(key).and_then(Value::as_str)
}

/// Read an integer-valued var, accepting both `I64` and numeric strings.
pub fn var_i64(vars: &BTreeMap<String, Value>, key: &str) -> Option<i64> {
    match vars.get(key) {
        Some(Value::I64(n)) => Some(*n),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a yes/no-valued var per [`Value::as_yes_no`], defaulting when absent.
pub fn var_yes_no(vars: &BTreeMap<String, Value>, key: &str, default: bool) -> bool {
    vars.get(key).map(|v| v.as_yes_no(default)).unwrap_or(default)
}

/// Build a [`Value::Map`] from field pairs, in source order (the map itself
/// is a `BTreeMap` so callers never need to worry about key order).
pub fn map(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
    let mut m = BTreeMap::new();
    for (k, v) in pairs {
        m.insert(k.to_string(), v);
    }
    Value::Map(m)
}

/// Render a timestamp the way every handler's dict response does: RFC 3339.
pub fn dt(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339())
}

/// A loose, dependency-free email check in the spirit of the original
/// system's `email_valid` helper: one `@`, a non-empty local part, and a
/// domain with at least one `.` and an alphabetic final segment of 2-7
/// characters.
pub fn email_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.contains('@') {
        return false;
    }
    if !local
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'%' | b'+' | b'-'))
    {
        return false;
    }
    let Some((rest, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if rest.is_empty() || !(2..=7).contains(&tld.len()) || !tld.bytes().all(|b| b.is_ascii_alphabetic()) {
        return false;
    }
    rest.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-'))
}

/// Parse the original system's `to_date_digits` format
/// (`yyyy[MM[dd[HH[mm[ss]]]]]`) used by the message handler's `since` var.
pub fn parse_date_digits(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || s.len() < 4 {
        return None;
    }
    let field = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        if s.len() >= range.end {
            s[range].parse().ok()
        } else {
            Some(default)
        }
    };
    let year: i32 = s[0..4].parse().ok()?;
    let month = field(4..6, 1)?;
    let day = field(6..8, 1)?;
    let hour = field(8..10, 0)?;
    let minute = field(10..12, 0)?;
    let second = field(12..14, 0)?;
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_tail_splits_on_first_slash() {
        assert_eq!(path_tail("bulletin/5"), Some("5"));
        assert_eq!(path_tail("bulletin"), None);
        assert_eq!(path_tail(""), None);
    }

    #[test]
    fn email_valid_accepts_common_shapes() {
        assert!(email_valid("w1aw@example.com"));
        assert!(email_valid("first.last+tag@sub.example.co"));
    }

    #[test]
    fn email_valid_rejects_malformed() {
        assert!(!email_valid("not-an-email"));
        assert!(!email_valid("a@b"));
        assert!(!email_valid("a@@b.com"));
        assert!(!email_valid("@b.com"));
    }

    #[test]
    fn date_digits_fill_in_missing_fields() {
        let full = parse_date_digits("20260115123045").unwrap();
        assert_eq!(full.to_string(), "2026-01-15 12:30:45 UTC");
        let year_only = parse_date_digits("2026").unwrap();
        assert_eq!(year_only.to_string(), "2026-01-01 00:00:00 UTC");
    }

    #[test]
    fn date_digits_rejects_non_digit_input() {
        assert!(parse_date_digits("abcd").is_none());
        assert!(parse_date_digits("").is_none());
    }
}
