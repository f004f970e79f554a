//! Pipeline data types, the work queue, and the result store

mod queue;
mod store;

pub use queue::WorkQueue;
pub use store::ResultStore;

use crate::extract::{ExtractionMethod, ExtractionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which discovery channel produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginType {
    FeedDerived,
    SitemapDerived,
    FallbackCrawlDerived,
}

/// A discovered article URL waiting to be fetched and extracted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Feed entry id, sitemap loc, or link, whichever the channel had
    pub id: String,
    /// URL to fetch
    pub link: String,
    /// Title as known at discovery time (feeds carry one, sitemaps get a
    /// synthetic placeholder)
    pub title: Option<String>,
    /// Publication date as known at discovery time
    pub published_date_utc: Option<DateTime<Utc>>,
    pub source_name: String,
    pub origin: OriginType,
}

impl CandidateItem {
    /// Key used for queue deduplication: the link, or the id for the rare
    /// entry with no usable link
    pub fn dedup_key(&self) -> &str {
        if self.link.is_empty() {
            &self.id
        } else {
            &self.link
        }
    }
}

/// The persisted record for one processed article: discovery metadata
/// merged with extraction output. Extraction values win over discovery
/// values when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: String,
    pub link: String,
    pub source_name: String,
    pub origin: OriginType,
    pub title: Option<String>,
    pub text: Option<String>,
    pub published_date_utc: Option<DateTime<Utc>>,
    pub authors: Vec<String>,
    pub method: ExtractionMethod,
    pub processed_at_utc: DateTime<Utc>,
}

impl StoredArticle {
    /// Merges a candidate with its extraction result
    pub fn merge(candidate: CandidateItem, extraction: ExtractionResult) -> Self {
        Self {
            id: candidate.id,
            link: candidate.link,
            source_name: candidate.source_name,
            origin: candidate.origin,
            title: extraction.title.or(candidate.title),
            text: extraction.text,
            published_date_utc: extraction
                .published_date_utc
                .or(candidate.published_date_utc),
            authors: extraction.authors,
            method: extraction.method,
            processed_at_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_extraction_values() {
        let candidate = CandidateItem {
            id: "urn:1".to_string(),
            link: "https://example.com/a".to_string(),
            title: Some("Feed title".to_string()),
            published_date_utc: None,
            source_name: "example".to_string(),
            origin: OriginType::FeedDerived,
        };
        let extraction = ExtractionResult {
            url: "https://example.com/a".to_string(),
            title: Some("Page headline".to_string()),
            text: Some("Body".to_string()),
            published_date_utc: Some(Utc::now()),
            authors: vec!["Jane Doe".to_string()],
            method: ExtractionMethod::StructuredMetadata,
        };

        let stored = StoredArticle::merge(candidate, extraction);
        assert_eq!(stored.title.as_deref(), Some("Page headline"));
        assert!(stored.published_date_utc.is_some());
    }

    #[test]
    fn test_stored_article_reads_back_from_json() {
        let stored = StoredArticle {
            id: "urn:1".to_string(),
            link: "https://example.com/a".to_string(),
            source_name: "example".to_string(),
            origin: OriginType::SitemapDerived,
            title: Some("Headline".to_string()),
            text: Some("Body".to_string()),
            published_date_utc: None,
            authors: vec!["Jane Doe".to_string()],
            method: ExtractionMethod::StructuredMetadata,
            processed_at_utc: Utc::now(),
        };

        let json = serde_json::to_string(&stored).unwrap();
        let back: StoredArticle = serde_json::from_str(&json).unwrap();
        assert_eq!(back.method, ExtractionMethod::StructuredMetadata);
        assert_eq!(back.origin, OriginType::SitemapDerived);
        assert_eq!(back.link, stored.link);
    }

    #[test]
    fn test_merge_falls_back_to_candidate_metadata() {
        let published = Utc::now();
        let candidate = CandidateItem {
            id: "urn:1".to_string(),
            link: "https://example.com/a".to_string(),
            title: Some("Feed title".to_string()),
            published_date_utc: Some(published),
            source_name: "example".to_string(),
            origin: OriginType::FeedDerived,
        };
        let extraction = ExtractionResult {
            url: "https://example.com/a".to_string(),
            title: None,
            text: None,
            published_date_utc: None,
            authors: vec![],
            method: ExtractionMethod::NoDataFound,
        };

        let stored = StoredArticle::merge(candidate, extraction);
        assert_eq!(stored.title.as_deref(), Some("Feed title"));
        assert_eq!(stored.published_date_utc, Some(published));
    }
}
