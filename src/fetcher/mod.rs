//! Fetcher: polite HTTP retrieval
//!
//! Every page fetch goes through one gate: robots rules are primed and
//! honored, the per-domain crawl delay is waited out, and a rotated client
//! identity is attached. Responses are screened by the Monitor for rate
//! limiting before the body is handed back.
//!
//! Robots.txt retrieval itself is exempt from robots gating (it could not
//! work otherwise) but still respects the crawl delay.

use crate::monitor::Monitor;
use crate::policy::{ParsedRobots, PolicyStore};
use crate::{FetchError, FetchResult};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Polite HTTP fetcher shared by all pipeline stages
#[derive(Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    identities: Vec<String>,
    policy: Arc<PolicyStore>,
    monitor: Arc<Monitor>,
    default_delay_secs: f64,
}

impl Fetcher {
    /// Creates a fetcher with the given identity pool and politeness state.
    ///
    /// # Arguments
    ///
    /// * `identities` - Client identity strings, one picked per request
    /// * `timeout_secs` - Whole-request timeout
    pub fn new(
        identities: Vec<String>,
        timeout_secs: u64,
        policy: Arc<PolicyStore>,
        monitor: Arc<Monitor>,
        default_delay_secs: f64,
    ) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            identities,
            policy,
            monitor,
            default_delay_secs,
        })
    }

    /// Fetches a URL's body as text, honoring robots rules and crawl delay.
    ///
    /// # Returns
    ///
    /// The response body on success. `FetchError::Blocked` when robots.txt
    /// disallows the URL (terminal for that URL); `Http` or `Network`
    /// otherwise, both of which a caller may retry on a later run.
    pub async fn fetch(&self, url: &str) -> FetchResult<String> {
        let parsed = Url::parse(url).map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: format!("invalid URL: {}", e),
        })?;
        let domain = parsed.host_str().unwrap_or_default().to_string();

        if self.policy.needs_robots(&domain) {
            self.prime_domain(&parsed).await;
        }

        let identity = self.pick_identity();
        if !self.policy.is_allowed(&domain, url, &identity) {
            return Err(FetchError::Blocked {
                url: url.to_string(),
            });
        }

        self.wait_for_domain(&domain).await;
        let response = self.send(url, &identity).await?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 503 {
            self.monitor
                .is_rate_limited("fetcher", url, Some(status.as_u16()), "");
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: format!("failed to read body: {}", e),
        })?;

        // A 200 can still be a bot wall; the Monitor scans the body start
        if self
            .monitor
            .is_rate_limited("fetcher", url, Some(status.as_u16()), &body)
        {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(body)
    }

    /// Fetches and caches robots rules for a URL's domain.
    ///
    /// A missing or unreadable robots.txt caches permissive rules so the
    /// domain is not re-probed on every request; the 24-hour expiry still
    /// applies.
    pub async fn prime_domain(&self, url: &Url) {
        let Some(domain) = url.host_str().map(|h| h.to_string()) else {
            return;
        };
        let Ok(robots_url) = url.join("/robots.txt") else {
            return;
        };

        let identity = self.pick_identity();
        self.wait_for_domain(&domain).await;
        let result = self.send(robots_url.as_str(), &identity).await;

        let robots = match result {
            Ok(response) if response.status().is_success() => {
                match response.text().await {
                    Ok(content) => ParsedRobots::from_content(&content),
                    Err(e) => {
                        tracing::warn!("Failed to read robots.txt for {}: {}", domain, e);
                        ParsedRobots::allow_all()
                    }
                }
            }
            Ok(response) => {
                tracing::debug!(
                    "robots.txt for {} returned {}; treating as allow-all",
                    domain,
                    response.status()
                );
                ParsedRobots::allow_all()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch robots.txt for {}: {}", domain, e);
                ParsedRobots::allow_all()
            }
        };

        let declared_delay = robots.crawl_delay(&identity);
        self.policy.set_robots(&domain, robots, declared_delay);
        tracing::debug!("Primed robots rules for {}", domain);
    }

    /// Reserves the domain's next request slot and sleeps until it opens.
    ///
    /// The slot is claimed under the store lock before any sleeping, so
    /// concurrent workers targeting one domain are admitted one crawl
    /// delay apart instead of passing the gate together.
    async fn wait_for_domain(&self, domain: &str) {
        let wait = self
            .policy
            .reserve_slot(domain, self.default_delay_secs, Instant::now());
        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before next request to {}", wait, domain);
            tokio::time::sleep(wait).await;
        }
    }

    async fn send(&self, url: &str, identity: &str) -> FetchResult<reqwest::Response> {
        self.client
            .get(url)
            .header(reqwest::header::USER_AGENT, identity)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Network {
                        url: url.to_string(),
                        message: "request timed out".to_string(),
                    }
                } else {
                    FetchError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })
    }

    fn pick_identity(&self) -> String {
        let mut rng = rand::thread_rng();
        self.identities
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default()
    }
}
