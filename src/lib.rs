//! Newshound: a polite news-article crawler
//!
//! This crate discovers, fetches, and extracts structured articles from news
//! websites while respecting each site's robots.txt rules and crawl delays,
//! and backing off when a server pushes back.

pub mod config;
pub mod discovery;
pub mod extract;
pub mod fetcher;
pub mod monitor;
pub mod pipeline;
pub mod planner;
pub mod policy;

use thiserror::Error;

/// Main error type for newshound operations
#[derive(Debug, Error)]
pub enum HoundError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Feed parse error for {url}: {message}")]
    FeedParse { url: String, message: String },

    #[error("Sitemap parse error for {url}: {message}")]
    SitemapParse { url: String, message: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Analyst error: {0}")]
    Analyst(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the Fetcher.
///
/// `Blocked` is terminal for a URL and is never retried. `Http` and
/// `Network` are recoverable: the caller abandons the item for the current
/// cycle and relies on the next scheduled run to rediscover it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL disallowed by robots.txt: {url}")]
    Blocked { url: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Whether a caller may see this URL succeed on a later run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FetchError::Blocked { .. })
    }
}

/// Configuration-specific errors (fatal at startup only)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse sources JSON: {0}")]
    Sources(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Result type alias for newshound operations
pub type Result<T> = std::result::Result<T, HoundError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::{AppConfig, SourceConfig, SourceRegistry};
pub use extract::{ExtractionMethod, ExtractionResult};
pub use monitor::Monitor;
pub use pipeline::{CandidateItem, OriginType};
pub use policy::PolicyStore;
