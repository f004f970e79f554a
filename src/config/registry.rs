//! Source registry: loading, lookup, and persistence of configured sources
//!
//! The registry is loaded once at startup and re-saved whenever a
//! selector-learning outcome mutates a source. Mutations go through the
//! methods here so the invariant between `extraction_selectors` and
//! `llm_analysis_pending` holds in one place.

use crate::config::types::{SourceConfig, SourcesFile};
use crate::ConfigResult;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The set of configured news sources, backed by a JSON file
#[derive(Debug)]
pub struct SourceRegistry {
    path: PathBuf,
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    /// Loads the registry from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path)?;
        let file: SourcesFile = serde_json::from_str(&raw)?;
        tracing::info!(
            "Loaded {} sources from {}",
            file.sources.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            sources: file.sources,
        })
    }

    /// Creates an in-memory registry (used by tests and library callers)
    pub fn from_sources(path: PathBuf, sources: Vec<SourceConfig>) -> Self {
        Self { path, sources }
    }

    /// Writes the registry back to its file
    pub fn save(&self) -> ConfigResult<()> {
        let file = SourcesFile {
            sources: self.sources.clone(),
        };
        let raw = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, raw)?;
        tracing::debug!("Saved {} sources to {}", self.sources.len(), self.path.display());
        Ok(())
    }

    /// All configured sources
    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Looks up one source by its unique name
    pub fn get(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut SourceConfig> {
        self.sources.iter_mut().find(|s| s.name == name)
    }

    /// Records a discovered feed URL on a source
    pub fn set_rss_feed(&mut self, name: &str, feed_url: String) -> bool {
        match self.get_mut(name) {
            Some(source) => {
                source.rss_feed = Some(feed_url);
                true
            }
            None => false,
        }
    }

    /// Applies learned extraction selectors to a source and clears the
    /// pending flag, preserving the registry invariant.
    pub fn apply_selectors(&mut self, name: &str, selectors: HashMap<String, String>) -> bool {
        match self.get_mut(name) {
            Some(source) => {
                source.llm_analysis_pending = selectors.is_empty();
                source.extraction_selectors = Some(selectors);
                true
            }
            None => false,
        }
    }

    /// Clears the learning flag without adding selectors, used when a
    /// learning attempt definitively failed so it is not retried forever.
    pub fn clear_analysis_pending(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(source) => {
                source.llm_analysis_pending = false;
                true
            }
            None => false,
        }
    }
}
