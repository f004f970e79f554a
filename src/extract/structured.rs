//! Structured-metadata extraction (JSON-LD)
//!
//! Looks for schema.org Article objects embedded in
//! `<script type="application/ld+json">` blocks. Publishers wrap these in
//! several shapes: a bare object, a top-level array, or a `@graph`
//! container; all three are handled.

use crate::extract::normalize::{normalize_authors, parse_date_utc};
use crate::extract::ExtractedFields;
use scraper::{Html, Selector};
use serde_json::Value;

/// schema.org types accepted as article metadata
fn is_article_type(type_value: &Value) -> bool {
    let matches_name = |name: &str| name.contains("Article") || name == "BlogPosting";
    match type_value {
        Value::String(s) => matches_name(s),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .any(matches_name),
        _ => false,
    }
}

/// Extracts article fields from JSON-LD metadata, if the page carries any
pub fn extract_structured(html: &str) -> Option<ExtractedFields> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        if let Some(article) = find_article_object(&value) {
            return Some(fields_from_article(article));
        }
    }
    None
}

/// Walks a JSON-LD document looking for the first Article-typed object
fn find_article_object(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if map.get("@type").map(is_article_type).unwrap_or(false) {
                return Some(value);
            }
            if let Some(graph) = map.get("@graph") {
                return find_article_object(graph);
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_article_object),
        _ => None,
    }
}

fn fields_from_article(article: &Value) -> ExtractedFields {
    let string_field = |keys: &[&str]| {
        keys.iter().find_map(|k| {
            article
                .get(*k)
                .and_then(|v| v.as_str())
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        })
    };

    ExtractedFields {
        title: string_field(&["headline", "name"]),
        text: string_field(&["articleBody", "text"]),
        published: string_field(&["datePublished", "dateModified"])
            .and_then(|raw| parse_date_utc(&raw)),
        authors: article
            .get("author")
            .map(normalize_authors)
            .unwrap_or_default(),
    }
}
