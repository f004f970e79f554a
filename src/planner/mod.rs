//! Planner: orchestrates discovery and consumption
//!
//! The Planner owns the shared pipeline state (politeness store, monitor,
//! fetcher, work queue, result store, source registry) and exposes the
//! operations the CLI drives: feed discovery, feed polling, sitemap
//! expansion, fallback crawling, and queue consumption.
//!
//! Per-source failures during discovery are reported to the Monitor and
//! never abort the run; one broken site must not starve the others.

use crate::config::{AppConfig, SourceConfig, SourceRegistry};
use crate::discovery::{find_feed_links_in_html, parse_feed, parse_sitemap, SitemapFile};
use crate::extract::{extract_article, ContentAnalyst, SelectorUpdate};
use crate::fetcher::Fetcher;
use crate::monitor::Monitor;
use crate::pipeline::{CandidateItem, OriginType, ResultStore, StoredArticle, WorkQueue};
use crate::policy::PolicyStore;
use crate::{ConfigError, Result};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};
use url::Url;

/// Counts reported at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Items still waiting in the queue
    pub queued_remaining: usize,
    /// Articles persisted by this process
    pub processed_this_run: usize,
    /// Article records on disk, all runs included
    pub stored_total: usize,
    /// Monitor events at warning severity or above
    pub warnings: usize,
}

/// Pipeline orchestrator
pub struct Planner {
    config: AppConfig,
    registry: Mutex<SourceRegistry>,
    policy: Arc<PolicyStore>,
    monitor: Arc<Monitor>,
    fetcher: Fetcher,
    queue: WorkQueue,
    store: ResultStore,
    analyst: Option<Arc<dyn ContentAnalyst>>,
}

impl Planner {
    /// Wires up the pipeline components from config
    pub fn new(
        config: AppConfig,
        registry: SourceRegistry,
        analyst: Option<Arc<dyn ContentAnalyst>>,
    ) -> Result<Self> {
        let default_delay = config.crawler.default_crawl_delay_secs;
        let policy = Arc::new(PolicyStore::new());
        let monitor = Arc::new(Monitor::new(policy.clone(), default_delay));
        let fetcher = Fetcher::new(
            config.user_agent.identities.clone(),
            config.crawler.request_timeout_secs,
            policy.clone(),
            monitor.clone(),
            default_delay,
        )?;
        let store = ResultStore::open(
            Path::new(&config.output.results_dir),
            config.output.recent_window_size,
        )?;

        Ok(Self {
            config,
            registry: Mutex::new(registry),
            policy,
            monitor,
            fetcher,
            queue: WorkQueue::new(),
            store,
            analyst,
        })
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Names of all configured sources
    pub fn source_names(&self) -> Vec<String> {
        self.registry
            .lock()
            .unwrap()
            .sources()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    fn source(&self, name: &str) -> Result<SourceConfig> {
        self.registry
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSource(name.to_string()).into())
    }

    /// Primes robots rules for a URL's domain when missing or stale
    async fn ensure_robots(&self, url: &Url) {
        if let Some(domain) = url.host_str() {
            if self.policy.needs_robots(domain) {
                self.fetcher.prime_domain(url).await;
            }
        }
    }

    /// Tries to find a feed advertised on a source's homepage and records
    /// it in the registry. A source that already has a feed is left alone.
    ///
    /// Returns true when a new feed URL was recorded.
    pub async fn discover_rss_feed_for_source(&self, name: &str) -> Result<bool> {
        let source = self.source(name)?;
        if source.rss_feed.is_some() {
            tracing::debug!("Source {} already has a feed; skipping discovery", name);
            return Ok(false);
        }

        let base = Url::parse(&source.base_url)?;
        let html = self.fetcher.fetch(&source.base_url).await?;
        let feeds = find_feed_links_in_html(&html, &base);
        let Some(feed_url) = feeds.into_iter().next() else {
            tracing::info!("No feed advertised on {}", source.base_url);
            return Ok(false);
        };

        tracing::info!("Discovered feed {} for source {}", feed_url, name);
        let registry = &mut *self.registry.lock().unwrap();
        registry.set_rss_feed(name, feed_url);
        registry.save()?;
        Ok(true)
    }

    /// Polls a source's feed and queues entries inside the recency window.
    ///
    /// Returns the number of newly queued candidates. A source without a
    /// feed queues nothing.
    pub async fn poll_rss_feed(&self, name: &str, recency_days: i64) -> Result<usize> {
        let source = self.source(name)?;
        let Some(feed_url) = source.rss_feed.clone() else {
            tracing::debug!("Source {} has no feed to poll", name);
            return Ok(0);
        };

        let body = self.fetcher.fetch(&feed_url).await?;
        let entries = parse_feed(&body, &feed_url)?;
        let total = entries.len();

        let mut accepted = 0;
        for entry in entries {
            if !self.monitor.is_item_new(entry.published, recency_days) {
                continue;
            }
            let item = CandidateItem {
                id: entry.id,
                link: entry.link,
                title: entry.title,
                published_date_utc: entry.published,
                source_name: source.name.clone(),
                origin: OriginType::FeedDerived,
            };
            if self.queue.enqueue(item) {
                accepted += 1;
            }
        }

        tracing::info!("Queued {}/{} feed entries from {}", accepted, total, feed_url);
        Ok(accepted)
    }

    /// Expands a source's sitemaps and queues recent page entries.
    ///
    /// Sitemap roots come from the domain's robots.txt; when it declares
    /// none, `<base>/sitemap.xml` is probed. Index files are followed
    /// breadth-first up to the configured nesting depth, with a visited
    /// set guarding against reference cycles.
    pub async fn discover_and_process_sitemaps(
        &self,
        name: &str,
        recency_days: i64,
    ) -> Result<usize> {
        let source = self.source(name)?;
        let base = Url::parse(&source.base_url)?;
        self.ensure_robots(&base).await;

        let domain = base.host_str().unwrap_or_default().to_string();
        let mut roots = self.policy.robots_sitemaps(&domain);
        if roots.is_empty() {
            if let Ok(guess) = base.join("/sitemap.xml") {
                tracing::debug!("No sitemaps in robots.txt for {}; probing {}", domain, guess);
                roots.push(guess.to_string());
            }
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut pending: VecDeque<(String, u32)> = roots.into_iter().map(|u| (u, 0)).collect();
        let mut accepted = 0;

        while let Some((sitemap_url, depth)) = pending.pop_front() {
            if !visited.insert(sitemap_url.clone()) {
                continue;
            }

            let body = match self.fetcher.fetch(&sitemap_url).await {
                Ok(body) => body,
                Err(e) => {
                    self.monitor.report_failure(
                        "planner",
                        &sitemap_url,
                        &format!("sitemap fetch failed: {}", e),
                    );
                    continue;
                }
            };

            match parse_sitemap(&body, &sitemap_url) {
                Ok(SitemapFile::Index(children)) => {
                    if depth + 1 > self.config.crawler.max_sitemap_depth {
                        tracing::warn!(
                            "Sitemap nesting exceeds depth {} at {}; not descending",
                            self.config.crawler.max_sitemap_depth,
                            sitemap_url
                        );
                        continue;
                    }
                    for child in children {
                        pending.push_back((child, depth + 1));
                    }
                }
                Ok(SitemapFile::UrlSet(entries)) => {
                    for entry in entries {
                        if !self.monitor.is_item_new(entry.lastmod_utc, recency_days) {
                            continue;
                        }
                        let item = CandidateItem {
                            id: entry.loc.clone(),
                            title: Some(synthetic_sitemap_title(&entry.loc)),
                            published_date_utc: entry.lastmod_utc,
                            link: entry.loc,
                            source_name: source.name.clone(),
                            origin: OriginType::SitemapDerived,
                        };
                        if self.queue.enqueue(item) {
                            accepted += 1;
                        }
                    }
                }
                Err(e) => {
                    self.monitor
                        .report_failure("planner", &sitemap_url, &e.to_string());
                }
            }
        }

        tracing::info!(
            "Queued {} candidates from {} sitemap file(s) for {}",
            accepted,
            visited.len(),
            name
        );
        Ok(accepted)
    }

    /// Crawls a source's homepage and section pages directly, for sources
    /// with no working feed or sitemap.
    ///
    /// Each page goes through the extraction chain; pages whose extracted
    /// date (if any) falls inside the recency window are queued with
    /// whatever metadata extraction found. Undated pages pass the filter.
    pub async fn fallback_crawl(&self, name: &str, recency_days: i64) -> Result<usize> {
        let mut pages = vec![self.source(name)?.base_url.clone()];
        if let Some(sections) = &self.source(name)?.sections {
            pages.extend(sections.iter().map(|s| s.url.clone()));
        }

        let mut accepted = 0;
        for page_url in pages {
            let html = match self.fetcher.fetch(&page_url).await {
                Ok(html) => html,
                Err(e) => {
                    self.monitor.report_failure(
                        "planner",
                        &page_url,
                        &format!("crawl fetch failed: {}", e),
                    );
                    continue;
                }
            };

            // Re-read the source each page so a learning outcome from an
            // earlier page is visible to later ones
            let source = self.source(name)?;
            let (result, update) =
                extract_article(&html, &page_url, &source, self.analyst.as_deref()).await;
            if let Some(update) = update {
                self.apply_selector_update(&source.name, update);
            }

            if !self
                .monitor
                .is_item_new(result.published_date_utc, recency_days)
            {
                continue;
            }

            let item = CandidateItem {
                id: page_url.clone(),
                link: page_url,
                title: result.title,
                published_date_utc: result.published_date_utc,
                source_name: source.name.clone(),
                origin: OriginType::FallbackCrawlDerived,
            };
            if self.queue.enqueue(item) {
                accepted += 1;
            }
        }

        tracing::info!("Queued {} crawl candidates for {}", accepted, name);
        Ok(accepted)
    }

    /// Runs the full discovery sequence for every configured source.
    ///
    /// Per source: discover a feed if none is known, poll the feed, expand
    /// sitemaps, and fall back to crawling listing pages only when the
    /// structured channels produced nothing.
    pub async fn run_all_discovery(&self, recency_days: i64) -> usize {
        let names = self.source_names();
        let mut total = 0;
        for name in names {
            total += self.discover_source(&name, recency_days).await;
        }
        tracing::info!("Discovery complete: {} candidates queued", total);
        total
    }

    async fn discover_source(&self, name: &str, recency_days: i64) -> usize {
        let mut queued = 0;

        if let Err(e) = self.discover_rss_feed_for_source(name).await {
            self.monitor
                .report_failure("planner", name, &format!("feed discovery failed: {}", e));
        }

        match self.poll_rss_feed(name, recency_days).await {
            Ok(n) => queued += n,
            Err(e) => self
                .monitor
                .report_failure("planner", name, &format!("feed poll failed: {}", e)),
        }

        match self.discover_and_process_sitemaps(name, recency_days).await {
            Ok(n) => queued += n,
            Err(e) => self
                .monitor
                .report_failure("planner", name, &format!("sitemap discovery failed: {}", e)),
        }

        if queued == 0 {
            match self.fallback_crawl(name, recency_days).await {
                Ok(n) => queued += n,
                Err(e) => self
                    .monitor
                    .report_failure("planner", name, &format!("fallback crawl failed: {}", e)),
            }
        }

        queued
    }

    /// Consumes the work queue with a bounded worker pool.
    ///
    /// Stops handing out new items once the shutdown signal flips, but
    /// lets in-flight items finish. Returns the number of worker tasks
    /// that ran.
    pub async fn process_queued_items(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> usize {
        let workers = self.config.crawler.max_concurrent_workers as usize;
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::new();

        loop {
            if *shutdown.borrow() {
                tracing::info!(
                    "Shutdown requested; leaving {} items queued",
                    self.queue.len()
                );
                break;
            }
            let Some(item) = self.queue.dequeue() else {
                break;
            };
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let planner = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                planner.process_one(item).await;
            }));
        }

        let launched = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task panicked: {}", e);
            }
        }
        launched
    }

    /// Fetches, extracts, and persists one candidate
    async fn process_one(&self, item: CandidateItem) {
        let html = match self.fetcher.fetch(&item.link).await {
            Ok(html) => html,
            Err(e) if e.is_recoverable() => {
                self.monitor
                    .report_failure("pipeline", &item.link, &format!("fetch failed: {}", e));
                return;
            }
            Err(_) => {
                tracing::info!("Skipping {}: disallowed by robots.txt", item.link);
                return;
            }
        };

        let source = self
            .registry
            .lock()
            .unwrap()
            .get(&item.source_name)
            .cloned();
        let Some(source) = source else {
            self.monitor.report_failure(
                "pipeline",
                &item.link,
                &format!("source {} vanished from registry", item.source_name),
            );
            return;
        };

        let (result, update) =
            extract_article(&html, &item.link, &source, self.analyst.as_deref()).await;
        if let Some(update) = update {
            self.apply_selector_update(&source.name, update);
        }

        let stored = StoredArticle::merge(item, result);
        if let Err(e) = self.store.persist(&stored) {
            self.monitor
                .report_failure("pipeline", &stored.link, &format!("persist failed: {}", e));
        }
    }

    /// Applies a learning outcome to the registry and saves it
    fn apply_selector_update(&self, source_name: &str, update: SelectorUpdate) {
        let registry = &mut *self.registry.lock().unwrap();
        let changed = match update.selectors {
            Some(selectors) => registry.apply_selectors(source_name, selectors),
            None if update.clear_pending => registry.clear_analysis_pending(source_name),
            None => false,
        };
        if changed {
            if let Err(e) = registry.save() {
                tracing::error!("Failed to save registry after learning: {}", e);
            }
        }
    }

    /// End-of-run counts
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            queued_remaining: self.queue.len(),
            processed_this_run: self.store.session_count(),
            stored_total: self.store.historical_count().unwrap_or(0),
            warnings: self.monitor.warning_count(),
        }
    }
}

/// Placeholder title for sitemap-derived candidates, refined at extraction
fn synthetic_sitemap_title(loc: &str) -> String {
    let segment = loc
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(loc);
    format!("Sitemap: {}", segment)
}
