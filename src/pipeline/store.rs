//! Result store: one JSON file per processed article
//!
//! Filenames are derived from the article link: a sanitized slug for
//! human readability plus a hash prefix for uniqueness, so re-processing
//! the same link overwrites its record instead of accumulating copies.

use crate::pipeline::StoredArticle;
use crate::{HoundError, Result};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Longest slug portion of a result filename
const SLUG_LIMIT: usize = 80;

#[derive(Debug, Default)]
struct StoreState {
    recent: VecDeque<String>,
    session_count: usize,
}

/// Persists processed articles to a directory, one JSON file each
#[derive(Debug)]
pub struct ResultStore {
    dir: PathBuf,
    window_size: usize,
    state: Mutex<StoreState>,
}

impl ResultStore {
    /// Opens (creating if needed) a result directory
    pub fn open(dir: &Path, window_size: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            window_size,
            state: Mutex::new(StoreState::default()),
        })
    }

    /// Writes one article record, returning the path written.
    ///
    /// The same link always maps to the same filename.
    pub fn persist(&self, article: &StoredArticle) -> Result<PathBuf> {
        let path = self.dir.join(Self::filename_for(&article.link));
        let raw = serde_json::to_string_pretty(article)?;
        fs::write(&path, raw).map_err(|e| {
            HoundError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;

        let mut state = self.state.lock().unwrap();
        state.session_count += 1;
        state.recent.push_back(article.link.clone());
        while state.recent.len() > self.window_size {
            state.recent.pop_front();
        }

        tracing::debug!("Persisted article to {}", path.display());
        Ok(path)
    }

    /// Articles persisted by this process
    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().session_count
    }

    /// Links of the most recently persisted articles, oldest first
    pub fn recent_links(&self) -> Vec<String> {
        self.state.lock().unwrap().recent.iter().cloned().collect()
    }

    /// Total records on disk, including those from earlier runs
    pub fn historical_count(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn filename_for(link: &str) -> String {
        let digest = Sha256::digest(link.as_bytes());
        let hash = hex::encode(&digest[..8]);

        let tail = link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(link);
        let mut slug = String::new();
        let mut last_dash = false;
        for c in tail.chars() {
            if slug.len() >= SLUG_LIMIT {
                break;
            }
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
                last_dash = false;
            } else if !last_dash && !slug.is_empty() {
                slug.push('-');
                last_dash = true;
            }
        }
        let slug = slug.trim_matches('-');

        if slug.is_empty() {
            format!("{}.json", hash)
        } else {
            format!("{}-{}.json", slug, hash)
        }
    }
}
