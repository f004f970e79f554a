//! Selector-based extraction
//!
//! Applies a source's configured per-field CSS selectors to a page. The
//! selector map uses field keys: `title`, `text` (alias `content`), `date`,
//! and `author` (alias `authors`). Unknown keys and selectors that fail to
//! parse are ignored rather than failing the page.

use crate::extract::normalize::parse_date_utc;
use crate::extract::ExtractedFields;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Extracts article fields using configured CSS selectors
pub fn extract_with_selectors(
    html: &str,
    selectors: &HashMap<String, String>,
) -> ExtractedFields {
    let document = Html::parse_document(html);
    let mut fields = ExtractedFields::default();

    for (key, raw_selector) in selectors {
        let Ok(selector) = Selector::parse(raw_selector) else {
            tracing::warn!("Ignoring unparseable selector {:?} for {}", raw_selector, key);
            continue;
        };

        match key.as_str() {
            "title" => {
                fields.title = document
                    .select(&selector)
                    .next()
                    .map(element_text)
                    .filter(|t| !t.is_empty());
            }
            "text" | "content" => {
                let paragraphs: Vec<String> = document
                    .select(&selector)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .collect();
                if !paragraphs.is_empty() {
                    fields.text = Some(paragraphs.join("\n\n"));
                }
            }
            "date" => {
                fields.published = document
                    .select(&selector)
                    .next()
                    .and_then(date_from_element);
            }
            "author" | "authors" => {
                for element in document.select(&selector) {
                    let name = element_text(element);
                    if !name.is_empty() && !fields.authors.iter().any(|a| *a == name) {
                        fields.authors.push(name);
                    }
                }
            }
            other => {
                tracing::debug!("Ignoring unknown selector field {:?}", other);
            }
        }
    }

    fields
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Reads a date from an element, preferring machine-readable attributes
/// (`datetime` on `<time>`, `content` on meta-like tags) over visible text
fn date_from_element(element: ElementRef) -> Option<chrono::DateTime<chrono::Utc>> {
    for attr in ["datetime", "content"] {
        if let Some(value) = element.value().attr(attr) {
            if let Some(parsed) = parse_date_utc(value) {
                return Some(parsed);
            }
        }
    }
    parse_date_utc(&element_text(element))
}
