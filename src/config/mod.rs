//! Configuration module for newshound
//!
//! Handles the TOML application config and the JSON source registry.
//!
//! # Example
//!
//! ```no_run
//! use newshound::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Results dir: {}", config.output.results_dir);
//! ```

mod registry;
mod types;

pub use registry::SourceRegistry;
pub use types::{
    AnalystConfig, AppConfig, CrawlerConfig, OutputConfig, SectionConfig, SourceConfig,
    SourcesFile, UserAgentConfig,
};

use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Loads and validates the application config from a TOML file
pub fn load_config(path: &Path) -> ConfigResult<AppConfig> {
    let (config, _hash) = load_config_with_hash(path)?;
    Ok(config)
}

/// Loads the application config and returns it with a hash of the raw file
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(AppConfig, String)> {
    let raw = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&raw)?;
    validate(&config)?;
    Ok((config, compute_config_hash(&raw)))
}

/// Computes a SHA-256 hash of raw config content
pub fn compute_config_hash(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

fn validate(config: &AppConfig) -> ConfigResult<()> {
    if config.crawler.default_crawl_delay_secs < 0.0 {
        return Err(ConfigError::Validation(
            "default-crawl-delay-secs must be non-negative".to_string(),
        ));
    }
    if config.crawler.max_concurrent_workers == 0 {
        return Err(ConfigError::Validation(
            "max-concurrent-workers must be at least 1".to_string(),
        ));
    }
    if config.user_agent.identities.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent.identities must not be empty".to_string(),
        ));
    }
    if config.output.results_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output.results-dir must not be empty".to_string(),
        ));
    }
    Ok(())
}
