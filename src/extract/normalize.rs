//! Field normalization for extracted article metadata
//!
//! Publication dates arrive in a mix of RFC 3339, RFC 2822, and naive
//! formats; author fields arrive as strings, arrays, or schema.org Person
//! objects. Everything is normalized here so the rest of the pipeline only
//! sees `DateTime<Utc>` and `Vec<String>`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Naive datetime formats tried in order when zoned parsing fails.
/// Naive values are assumed to be UTC; `%.f` also matches a timestamp with
/// no fractional part.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a date string into UTC.
///
/// Tries RFC 3339, then RFC 2822, then common naive formats, then a bare
/// date. Returns `None` when nothing matches; callers treat undated as
/// "recent enough" rather than dropping the item.
pub fn parse_date_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}

/// Flattens an author field into a list of names.
///
/// Accepts a plain string, an array of strings, a schema.org Person object
/// with a `name` key, or an array of such objects. Blank names are dropped.
pub fn normalize_authors(value: &Value) -> Vec<String> {
    let mut authors = Vec::new();
    collect_authors(value, &mut authors);
    authors
}

fn collect_authors(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => push_author(s, out),
        Value::Array(items) => {
            for item in items {
                collect_authors(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("name") {
                push_author(name, out);
            }
        }
        _ => {}
    }
}

fn push_author(name: &str, out: &mut Vec<String>) {
    let trimmed = name.trim();
    if !trimmed.is_empty() && !out.iter().any(|a| a == trimmed) {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_date_utc("2026-03-15T10:30:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 15, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc2822() {
        let dt = parse_date_utc("Sun, 15 Mar 2026 10:30:00 GMT").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_assumes_utc() {
        let dt = parse_date_utc("2026-03-15T10:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 15, 10, 30, 0).unwrap());

        let dt = parse_date_utc("2026-03-15 10:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_fractional_seconds() {
        let dt = parse_date_utc("2026-03-15T10:30:00.123").unwrap();
        assert_eq!(
            dt,
            Utc.with_ymd_and_hms(2026, 3, 15, 10, 30, 0).unwrap()
                + chrono::Duration::milliseconds(123)
        );

        let dt = parse_date_utc("2026-03-15 10:30:00.5").unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_bare_date() {
        let dt = parse_date_utc("2026-03-15").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_date_utc("").is_none());
        assert!(parse_date_utc("yesterday").is_none());
        assert!(parse_date_utc("15/03/2026").is_none());
    }

    #[test]
    fn test_parse_is_idempotent_on_utc_output() {
        let once = parse_date_utc("2026-03-15T10:30:00+02:00").unwrap();
        let twice = parse_date_utc(&once.to_rfc3339()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_authors_from_string() {
        assert_eq!(
            normalize_authors(&json!("  Jane Doe ")),
            vec!["Jane Doe".to_string()]
        );
    }

    #[test]
    fn test_authors_from_array_of_strings() {
        assert_eq!(
            normalize_authors(&json!(["Jane Doe", "John Smith"])),
            vec!["Jane Doe".to_string(), "John Smith".to_string()]
        );
    }

    #[test]
    fn test_authors_from_person_objects() {
        let value = json!([
            {"@type": "Person", "name": "Jane Doe"},
            {"@type": "Person", "name": "John Smith"}
        ]);
        assert_eq!(
            normalize_authors(&value),
            vec!["Jane Doe".to_string(), "John Smith".to_string()]
        );
    }

    #[test]
    fn test_authors_single_object_and_blanks() {
        assert_eq!(
            normalize_authors(&json!({"name": "Jane Doe"})),
            vec!["Jane Doe".to_string()]
        );
        assert!(normalize_authors(&json!({"name": "  "})).is_empty());
        assert!(normalize_authors(&json!(null)).is_empty());
        assert!(normalize_authors(&json!(42)).is_empty());
    }

    #[test]
    fn test_authors_deduplicated() {
        assert_eq!(
            normalize_authors(&json!(["Jane Doe", "Jane Doe"])),
            vec!["Jane Doe".to_string()]
        );
    }
}
