//! Extraction: turning a fetched page into structured article fields
//!
//! Strategies run as a fixed chain, cheapest first:
//!
//! 1. Structured metadata embedded in the page (JSON-LD)
//! 2. The source's configured CSS selectors
//! 3. One-time selector learning via the content analyst, when the source
//!    still owes an attempt
//! 4. General analyst extraction straight from the HTML
//!
//! The chain stops as soon as a result is sufficient (non-blank title and
//! body text). Later strategies only fill fields earlier ones left empty.
//! Registry mutations are never performed here; a [`SelectorUpdate`] is
//! handed back for the caller to apply.
//!
//! HTML parsing stays inside the synchronous strategy functions, so no
//! parsed document is ever held across an await point.

pub mod analyst;
mod normalize;
mod selectors;
mod structured;

pub use analyst::{ContentAnalyst, GeneralExtraction, HttpAnalyst, MockAnalyst};
pub use normalize::{normalize_authors, parse_date_utc};
pub use selectors::extract_with_selectors;
pub use structured::extract_structured;

use crate::config::SourceConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which strategy produced an extraction result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    StructuredMetadata,
    ConfiguredSelectors,
    LlmGeneral,
    NoDataFound,
}

/// Raw field values produced by a single strategy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub text: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub authors: Vec<String>,
}

impl ExtractedFields {
    /// A result is sufficient once it has a non-blank title and body text
    pub fn is_sufficient(&self) -> bool {
        let non_blank = |field: &Option<String>| {
            field
                .as_ref()
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
        };
        non_blank(&self.title) && non_blank(&self.text)
    }

    /// Fills fields this set is missing from another, keeping existing values
    fn fill_missing_from(&mut self, other: ExtractedFields) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.text.is_none() {
            self.text = other.text;
        }
        if self.published.is_none() {
            self.published = other.published;
        }
        if self.authors.is_empty() {
            self.authors = other.authors;
        }
    }
}

/// Final outcome of running the extraction chain on one page
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub url: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub published_date_utc: Option<DateTime<Utc>>,
    pub authors: Vec<String>,
    pub method: ExtractionMethod,
}

impl ExtractionResult {
    pub fn is_sufficient(&self) -> bool {
        let non_blank = |field: &Option<String>| {
            field
                .as_ref()
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
        };
        non_blank(&self.title) && non_blank(&self.text)
    }

    fn from_fields(url: &str, fields: ExtractedFields, method: ExtractionMethod) -> Self {
        Self {
            url: url.to_string(),
            title: fields.title,
            text: fields.text,
            published_date_utc: fields.published,
            authors: fields.authors,
            method,
        }
    }
}

/// Registry mutation requested by the extraction chain.
///
/// Produced when a selector-learning attempt resolves; the caller applies
/// it to the source registry and persists it.
#[derive(Debug, Clone)]
pub struct SelectorUpdate {
    /// Learned selectors to store on the source, when the attempt succeeded
    pub selectors: Option<HashMap<String, String>>,
    /// Whether the one-time learning flag should be cleared
    pub clear_pending: bool,
}

/// Runs the extraction chain on one fetched page.
///
/// # Arguments
///
/// * `source` - The source the page belongs to; supplies selectors and the
///   learning flag
/// * `analyst` - Content analyst, when one is configured
///
/// # Returns
///
/// The best extraction the chain produced, plus any registry update a
/// learning attempt calls for.
pub async fn extract_article(
    html: &str,
    url: &str,
    source: &SourceConfig,
    analyst: Option<&dyn ContentAnalyst>,
) -> (ExtractionResult, Option<SelectorUpdate>) {
    let mut best = ExtractedFields::default();
    let mut update: Option<SelectorUpdate> = None;

    if let Some(fields) = extract_structured(html) {
        best.fill_missing_from(fields);
        if best.is_sufficient() {
            return (
                ExtractionResult::from_fields(url, best, ExtractionMethod::StructuredMetadata),
                None,
            );
        }
    }

    if source.has_selectors() {
        if let Some(selectors) = &source.extraction_selectors {
            best.fill_missing_from(extract_with_selectors(html, selectors));
            if best.is_sufficient() {
                return (
                    ExtractionResult::from_fields(url, best, ExtractionMethod::ConfiguredSelectors),
                    None,
                );
            }
        }
    } else if source.llm_analysis_pending {
        if let Some(analyst) = analyst {
            match analyst.propose_selectors(url, html).await {
                Ok(Some(learned)) => {
                    tracing::info!(
                        "Learned {} selectors for source {}",
                        learned.len(),
                        source.name
                    );
                    best.fill_missing_from(extract_with_selectors(html, &learned));
                    update = Some(SelectorUpdate {
                        selectors: Some(learned),
                        clear_pending: true,
                    });
                    if best.is_sufficient() {
                        return (
                            ExtractionResult::from_fields(
                                url,
                                best,
                                ExtractionMethod::ConfiguredSelectors,
                            ),
                            update,
                        );
                    }
                }
                Ok(None) => {
                    tracing::info!(
                        "Analyst found no usable selectors for source {}",
                        source.name
                    );
                    update = Some(SelectorUpdate {
                        selectors: None,
                        clear_pending: true,
                    });
                }
                Err(e) => {
                    // Clear the flag anyway so a page that cannot be
                    // analyzed does not trigger an attempt on every visit
                    tracing::warn!("Selector learning failed for {}: {}", source.name, e);
                    update = Some(SelectorUpdate {
                        selectors: None,
                        clear_pending: true,
                    });
                }
            }
        }
    }

    if let Some(analyst) = analyst {
        match analyst.extract_general(url, html).await {
            Ok(Some(extraction)) => {
                best.fill_missing_from(extraction.into_fields());
                if best.is_sufficient() {
                    return (
                        ExtractionResult::from_fields(url, best, ExtractionMethod::LlmGeneral),
                        update,
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("General extraction failed for {}: {}", url, e);
            }
        }
    }

    (
        ExtractionResult::from_fields(url, best, ExtractionMethod::NoDataFound),
        update,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_source() -> SourceConfig {
        SourceConfig {
            name: "example".to_string(),
            base_url: "https://example.com".to_string(),
            rss_feed: None,
            sections: None,
            extraction_selectors: None,
            llm_analysis_pending: false,
        }
    }

    const LD_PAGE: &str = r#"<html><head>
        <script type="application/ld+json">
        {"@type": "NewsArticle", "headline": "Structured headline",
         "articleBody": "Structured body", "datePublished": "2026-03-15T00:00:00Z"}
        </script></head><body></body></html>"#;

    const SELECTOR_PAGE: &str = r#"<html><body>
        <h1 class="headline">Selector headline</h1>
        <div class="body"><p>Selector body text.</p></div>
    </body></html>"#;

    #[test]
    fn test_sufficiency() {
        let mut fields = ExtractedFields::default();
        assert!(!fields.is_sufficient());

        fields.title = Some("T".to_string());
        assert!(!fields.is_sufficient());

        fields.text = Some("   ".to_string());
        assert!(!fields.is_sufficient());

        fields.text = Some("Body".to_string());
        assert!(fields.is_sufficient());
    }

    #[tokio::test]
    async fn test_structured_short_circuits() {
        let analyst = MockAnalyst::new();
        let (result, update) =
            extract_article(LD_PAGE, "https://example.com/a", &bare_source(), Some(&analyst))
                .await;

        assert_eq!(result.method, ExtractionMethod::StructuredMetadata);
        assert!(result.is_sufficient());
        assert!(update.is_none());
        // Analyst never consulted
        assert!(analyst.calls().is_empty());
    }

    #[tokio::test]
    async fn test_configured_selectors_used() {
        let mut source = bare_source();
        let mut selectors = HashMap::new();
        selectors.insert("title".to_string(), "h1.headline".to_string());
        selectors.insert("text".to_string(), "div.body p".to_string());
        source.extraction_selectors = Some(selectors);

        let (result, update) =
            extract_article(SELECTOR_PAGE, "https://example.com/a", &source, None).await;

        assert_eq!(result.method, ExtractionMethod::ConfiguredSelectors);
        assert_eq!(result.title.as_deref(), Some("Selector headline"));
        assert!(update.is_none());
    }

    #[tokio::test]
    async fn test_learning_success_returns_update() {
        let mut source = bare_source();
        source.llm_analysis_pending = true;

        let mut learned = HashMap::new();
        learned.insert("title".to_string(), "h1.headline".to_string());
        learned.insert("text".to_string(), "div.body p".to_string());
        let analyst = MockAnalyst::new().with_selectors(learned);

        let (result, update) =
            extract_article(SELECTOR_PAGE, "https://example.com/a", &source, Some(&analyst))
                .await;

        assert_eq!(result.method, ExtractionMethod::ConfiguredSelectors);
        let update = update.unwrap();
        assert!(update.clear_pending);
        assert!(update.selectors.is_some());
        assert_eq!(analyst.calls(), vec!["propose_selectors".to_string()]);
    }

    #[tokio::test]
    async fn test_learning_definitive_failure_clears_flag() {
        let mut source = bare_source();
        source.llm_analysis_pending = true;

        // Analyst answers but proposes nothing, and general extraction
        // also finds nothing
        let analyst = MockAnalyst::new();
        let (result, update) = extract_article(
            "<html><body>not an article</body></html>",
            "https://example.com/a",
            &source,
            Some(&analyst),
        )
        .await;

        assert_eq!(result.method, ExtractionMethod::NoDataFound);
        let update = update.unwrap();
        assert!(update.clear_pending);
        assert!(update.selectors.is_none());
    }

    #[tokio::test]
    async fn test_learning_service_error_still_clears_flag() {
        let mut source = bare_source();
        source.llm_analysis_pending = true;

        let analyst = MockAnalyst::new().failing();
        let (result, update) = extract_article(
            "<html><body>page</body></html>",
            "https://example.com/a",
            &source,
            Some(&analyst),
        )
        .await;

        assert_eq!(result.method, ExtractionMethod::NoDataFound);
        let update = update.unwrap();
        assert!(update.clear_pending);
        assert!(update.selectors.is_none());
    }

    #[tokio::test]
    async fn test_general_extraction_fallback() {
        let analyst = MockAnalyst::new().with_general(GeneralExtraction {
            title: Some("General headline".to_string()),
            text: Some("General body".to_string()),
            date: Some("2026-03-15".to_string()),
            authors: vec!["Jane Doe".to_string()],
        });

        let (result, _) = extract_article(
            "<html><body>opaque markup</body></html>",
            "https://example.com/a",
            &bare_source(),
            Some(&analyst),
        )
        .await;

        assert_eq!(result.method, ExtractionMethod::LlmGeneral);
        assert_eq!(result.title.as_deref(), Some("General headline"));
        assert!(result.published_date_utc.is_some());
    }

    #[tokio::test]
    async fn test_no_data_found_without_analyst() {
        let (result, update) = extract_article(
            "<html><body>nothing here</body></html>",
            "https://example.com/a",
            &bare_source(),
            None,
        )
        .await;

        assert_eq!(result.method, ExtractionMethod::NoDataFound);
        assert!(!result.is_sufficient());
        assert!(update.is_none());
    }

    #[tokio::test]
    async fn test_later_strategy_fills_missing_fields() {
        // Structured metadata has a title but no body; the analyst supplies
        // the body and the result is attributed to the analyst
        let partial_ld = r#"<html><head>
            <script type="application/ld+json">
            {"@type": "NewsArticle", "headline": "Partial headline"}
            </script></head><body></body></html>"#;

        let analyst = MockAnalyst::new().with_general(GeneralExtraction {
            title: None,
            text: Some("Recovered body".to_string()),
            date: None,
            authors: vec![],
        });

        let (result, _) = extract_article(
            partial_ld,
            "https://example.com/a",
            &bare_source(),
            Some(&analyst),
        )
        .await;

        assert_eq!(result.method, ExtractionMethod::LlmGeneral);
        assert_eq!(result.title.as_deref(), Some("Partial headline"));
        assert_eq!(result.text.as_deref(), Some("Recovered body"));
    }
}
