use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration for newshound
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub analyst: AnalystConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Default minimum delay between requests to the same domain (seconds),
    /// used when neither robots.txt nor rate-limit feedback has set one
    #[serde(rename = "default-crawl-delay-secs", default = "default_crawl_delay")]
    pub default_crawl_delay_secs: f64,

    /// Request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of concurrent consumption workers
    #[serde(rename = "max-concurrent-workers", default = "default_workers")]
    pub max_concurrent_workers: u32,

    /// Maximum sitemap-index nesting depth to expand
    #[serde(rename = "max-sitemap-depth", default = "default_sitemap_depth")]
    pub max_sitemap_depth: u32,
}

fn default_crawl_delay() -> f64 {
    1.0
}

fn default_timeout() -> u64 {
    15
}

fn default_workers() -> u32 {
    4
}

fn default_sitemap_depth() -> u32 {
    5
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Client identity strings rotated across requests
    #[serde(default = "default_identities")]
    pub identities: Vec<String>,
}

fn default_identities() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/98.0.4758.102 Safari/537.36"
            .to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) \
         Version/15.0 Safari/605.1.15"
            .to_string(),
    ]
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory where article records are written, one JSON file each
    #[serde(rename = "results-dir")]
    pub results_dir: String,

    /// How many recent results to keep in memory for inspection
    #[serde(rename = "recent-window-size", default = "default_window")]
    pub recent_window_size: usize,
}

fn default_window() -> usize {
    1000
}

/// Configuration for the external content-understanding service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalystConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    /// When absent, analyst-backed extraction strategies are skipped.
    pub endpoint: Option<String>,

    /// Model name passed through to the endpoint
    pub model: Option<String>,

    /// API key, if the endpoint requires one
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,
}

/// One configured news site in the source registry.
///
/// `extraction_selectors` and `llm_analysis_pending` are mutated in place
/// when a selector-learning attempt resolves, then persisted back to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique key for this source
    pub name: String,

    /// Homepage of the site
    pub base_url: String,

    /// Configured or discovered RSS/Atom feed URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rss_feed: Option<String>,

    /// Named section pages crawled by the fallback crawl
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionConfig>>,

    /// Per-field CSS selectors for extraction; absent or empty means
    /// "no usable selectors"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_selectors: Option<HashMap<String, String>>,

    /// Whether a one-time selector-learning attempt is still owed.
    /// True only while `extraction_selectors` is absent or empty.
    #[serde(default)]
    pub llm_analysis_pending: bool,
}

impl SourceConfig {
    /// Returns true if this source has usable extraction selectors
    pub fn has_selectors(&self) -> bool {
        self.extraction_selectors
            .as_ref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

/// A named sub-URL of a source (e.g. a politics section page)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    pub name: String,
    pub url: String,
}

/// On-disk shape of the source registry file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}
