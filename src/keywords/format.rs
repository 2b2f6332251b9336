//! The `format` keyword: dispatch into a registry of named assertions.
//!
//! A registered format that fails is an error; a format name nobody
//! registered is an annotation and nothing more. The stock registry covers
//! the common draft formats; [`Compiler::register_format`] replaces or
//! extends it.
//!
//! [`Compiler::register_format`]: crate::compiler::Compiler::register_format

use crate::compiler::FormatCheck;
use crate::schema::Schema;
use crate::validator::EvaluationError;
use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::Url;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
    static ref HOSTNAME: Regex = Regex::new(
        r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$"
    )
    .unwrap();
    static ref UUID: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .unwrap();
    static ref TIME: Regex =
        Regex::new(r"^(\d{2}):(\d{2}):(\d{2})(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$").unwrap();
    static ref JSON_POINTER: Regex = Regex::new(r"^(/([^/~]|~[01])*)*$").unwrap();
    static ref REFERENCE_BASE: Url =
        Url::parse("relative://resolution.invalid/").expect("static base URL parses");
}

pub(crate) fn stock_registry() -> HashMap<String, FormatCheck> {
    let entries: [(&str, FormatCheck); 13] = [
        ("date-time", check_date_time),
        ("date", check_date),
        ("time", check_time),
        ("duration", check_duration),
        ("email", check_email),
        ("hostname", check_hostname),
        ("ipv4", check_ipv4),
        ("ipv6", check_ipv6),
        ("uuid", check_uuid),
        ("uri", check_uri),
        ("uri-reference", check_uri_reference),
        ("json-pointer", check_json_pointer),
        ("regex", check_regex),
    ];
    entries
        .iter()
        .map(|(name, check)| ((*name).to_owned(), *check))
        .collect()
}

pub(crate) fn eval_format(schema: &Schema, instance: &Value) -> Option<EvaluationError> {
    let name = schema.format.as_deref()?;
    // Formats only constrain strings.
    let text = instance.as_str()?;
    let shared = schema.compiler.upgrade()?;
    let check = shared.format_check(name)?;

    if check(text) {
        return None;
    }
    Some(
        EvaluationError::new(
            "format",
            "format_mismatch",
            "String does not conform to the {format} format",
        )
        .with_param("format", json!(name)),
    )
}

fn check_date_time(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
}

fn check_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

fn check_time(text: &str) -> bool {
    let Some(captures) = TIME.captures(text) else {
        return false;
    };
    let field = |index: usize| -> u32 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(99)
    };
    // Seconds may be 60 for a leap second.
    field(1) < 24 && field(2) < 60 && field(3) <= 60
}

/// ISO 8601 duration: designators with digits, in order, at least one unit.
/// The week form stands alone.
fn check_duration(text: &str) -> bool {
    let Some(body) = text.strip_prefix('P') else {
        return false;
    };
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    if date_part.contains('W') {
        return time_part.is_none() && matches!(parse_units(date_part, &['W']), Some(true));
    }

    let date_units = match parse_units(date_part, &['Y', 'M', 'D']) {
        Some(any) => any,
        None => return false,
    };
    match time_part {
        Some(time) => matches!(parse_units(time, &['H', 'M', 'S']), Some(true)),
        None => date_units,
    }
}

/// Walks digit/designator pairs, enforcing designator order. `None` means
/// malformed; `Some(any)` reports whether any unit appeared.
fn parse_units(segment: &str, order: &[char]) -> Option<bool> {
    let mut next_allowed = 0;
    let mut pending_digits = false;
    let mut any = false;

    for c in segment.chars() {
        if c.is_ascii_digit() {
            pending_digits = true;
            continue;
        }
        if !pending_digits {
            return None;
        }
        let found = order.iter().position(|unit| *unit == c)?;
        if found < next_allowed {
            return None;
        }
        next_allowed = found + 1;
        pending_digits = false;
        any = true;
    }

    if pending_digits {
        return None;
    }
    Some(any)
}

fn check_email(text: &str) -> bool {
    EMAIL.is_match(text)
}

fn check_hostname(text: &str) -> bool {
    text.len() <= 253 && HOSTNAME.is_match(text)
}

fn check_ipv4(text: &str) -> bool {
    text.parse::<Ipv4Addr>().is_ok()
}

fn check_ipv6(text: &str) -> bool {
    text.parse::<Ipv6Addr>().is_ok()
}

fn check_uuid(text: &str) -> bool {
    UUID.is_match(text)
}

fn check_uri(text: &str) -> bool {
    Url::parse(text).is_ok()
}

fn check_uri_reference(text: &str) -> bool {
    if text.contains(char::is_whitespace) {
        return false;
    }
    Url::parse(text).is_ok() || REFERENCE_BASE.join(text).is_ok()
}

fn check_json_pointer(text: &str) -> bool {
    JSON_POINTER.is_match(text)
}

fn check_regex(text: &str) -> bool {
    Regex::new(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use serde_json::json;

    #[test]
    fn registered_formats_assert() {
        let compiler = Compiler::new();
        let schema = compiler
            .compile_value(json!({"format": "date-time"}))
            .unwrap();

        assert!(eval_format(&schema, &json!("2024-03-01T12:30:00Z")).is_none());
        let error = eval_format(&schema, &json!("yesterday at noon")).unwrap();
        assert_eq!(error.code(), "format_mismatch");
        assert_eq!(error.params()["format"], json!("date-time"));
    }

    #[test]
    fn unknown_formats_are_annotations() {
        let compiler = Compiler::new();
        let schema = compiler
            .compile_value(json!({"format": "postal-carrier-route"}))
            .unwrap();
        assert!(eval_format(&schema, &json!("anything")).is_none());
    }

    #[test]
    fn formats_apply_only_to_strings() {
        let compiler = Compiler::new();
        let schema = compiler.compile_value(json!({"format": "ipv4"})).unwrap();
        assert!(eval_format(&schema, &json!(4)).is_none());
    }

    #[test]
    fn stock_checks() {
        assert!(check_date("2024-02-29"));
        assert!(!check_date("2023-02-29"));

        assert!(check_time("23:59:60Z"));
        assert!(check_time("10:00:00+05:30"));
        assert!(!check_time("24:00:00Z"));
        assert!(!check_time("10:00:00"));

        assert!(check_duration("P1Y2M3DT4H5M6S"));
        assert!(check_duration("PT15M"));
        assert!(check_duration("P4W"));
        assert!(!check_duration("P"));
        assert!(!check_duration("PT"));
        assert!(!check_duration("P1D2Y"));
        assert!(!check_duration("P4W1D"));

        assert!(check_ipv4("192.168.0.1"));
        assert!(!check_ipv4("192.168.0.256"));
        assert!(check_ipv6("::1"));

        assert!(check_uuid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!check_uuid("123e4567"));

        assert!(check_uri("http://example.com/a?b=c"));
        assert!(!check_uri("not a uri"));
        assert!(check_uri_reference("../relative/path"));

        assert!(check_json_pointer(""));
        assert!(check_json_pointer("/a/b~0c/~1"));
        assert!(!check_json_pointer("a/b"));
        assert!(!check_json_pointer("/a~2"));

        assert!(check_regex("^a[bc]$"));
        assert!(!check_regex("["));

        assert!(check_hostname("example.com"));
        assert!(!check_hostname("-bad.example"));
    }
}
