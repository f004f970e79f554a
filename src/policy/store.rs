//! Shared per-domain politeness state
//!
//! One `PolicyStore` is constructed per run and handed (as an `Arc`) to the
//! Fetcher, the Monitor, and the Planner. It is the only cross-component
//! shared mutable state: robots rules, crawl delays, and request-slot
//! timestamps, all keyed by domain. Writes happen under the store lock;
//! request admission is serialized through [`PolicyStore::reserve_slot`] so
//! concurrent workers cannot pass the delay gate together.

use crate::policy::ParsedRobots;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Ceiling for rate-limit backoff (seconds)
pub const DELAY_CEILING_SECS: f64 = 300.0;

/// Additive increment applied once doubling stops moving the delay
const DELAY_INCREMENT_SECS: f64 = 60.0;

/// Politeness state for one domain, created lazily on first contact
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    /// Parsed robots rules, if fetched
    pub robots: Option<ParsedRobots>,

    /// When robots.txt was fetched (for 24h cache expiry)
    pub robots_fetched_at: Option<DateTime<Utc>>,

    /// Crawl delay in seconds; set from robots.txt at priming time and
    /// raised by the Monitor on rate-limit detection
    pub crawl_delay_secs: Option<f64>,

    /// Earliest instant the next request to this domain may be sent
    pub next_allowed: Option<Instant>,
}

impl DomainPolicy {
    /// Checks if the cached robots rules are stale (older than 24 hours)
    pub fn is_robots_stale(&self) -> bool {
        match self.robots_fetched_at {
            Some(fetched_at) => Utc::now() - fetched_at > chrono::Duration::hours(24),
            None => true,
        }
    }
}

/// Lock-guarded map of domain → politeness state
#[derive(Debug, Default)]
pub struct PolicyStore {
    domains: Mutex<HashMap<String, DomainPolicy>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether robots rules for this domain need a (re)fetch
    pub fn needs_robots(&self, domain: &str) -> bool {
        let domains = self.domains.lock().unwrap();
        match domains.get(domain) {
            Some(policy) => policy.robots.is_none() || policy.is_robots_stale(),
            None => true,
        }
    }

    /// Stores freshly fetched robots rules and any crawl delay they declare.
    ///
    /// A robots-declared delay never lowers a delay previously raised by
    /// rate-limit feedback.
    pub fn set_robots(&self, domain: &str, robots: ParsedRobots, declared_delay: Option<f64>) {
        let mut domains = self.domains.lock().unwrap();
        let policy = domains.entry(domain.to_string()).or_default();
        policy.robots = Some(robots);
        policy.robots_fetched_at = Some(Utc::now());
        if let Some(delay) = declared_delay {
            policy.crawl_delay_secs = Some(match policy.crawl_delay_secs {
                Some(existing) => existing.max(delay),
                None => delay,
            });
        }
    }

    /// Checks a URL against the domain's cached robots rules.
    ///
    /// A domain with no cached rules is treated as allowed; callers are
    /// expected to prime robots first via [`needs_robots`] + [`set_robots`].
    pub fn is_allowed(&self, domain: &str, url: &str, user_agent: &str) -> bool {
        let domains = self.domains.lock().unwrap();
        match domains.get(domain).and_then(|p| p.robots.as_ref()) {
            Some(robots) => robots.is_allowed(url, user_agent),
            None => true,
        }
    }

    /// The currently cached crawl delay for a domain, if any
    pub fn delay_secs(&self, domain: &str) -> Option<f64> {
        let domains = self.domains.lock().unwrap();
        domains.get(domain).and_then(|p| p.crawl_delay_secs)
    }

    /// Effective inter-request delay: the greater of the cached per-domain
    /// delay (robots-declared or monitor-raised) and the configured default.
    pub fn effective_delay(&self, domain: &str, default_secs: f64) -> Duration {
        let domains = self.domains.lock().unwrap();
        effective_delay_of(&domains, domain, default_secs)
    }

    /// Reserves the next request slot for a domain and returns how long the
    /// caller must sleep before sending.
    ///
    /// The domain's next-allowed timestamp is advanced by the effective
    /// delay under the store lock, so concurrent callers each get their own
    /// slot one delay apart; the gap between any two sends to a domain is
    /// at least the effective delay regardless of how many workers fetch
    /// from it at once.
    pub fn reserve_slot(&self, domain: &str, default_secs: f64, now: Instant) -> Duration {
        let mut domains = self.domains.lock().unwrap();
        let delay = effective_delay_of(&domains, domain, default_secs);

        let policy = domains.entry(domain.to_string()).or_default();
        let slot = match policy.next_allowed {
            Some(next) if next > now => next,
            _ => now,
        };
        policy.next_allowed = Some(slot + delay);
        slot.saturating_duration_since(now)
    }

    /// Raises the domain's crawl delay in response to rate-limit detection.
    ///
    /// Doubles the delay from a baseline of at least one second, capped at
    /// the ceiling; once doubling no longer moves an already-elevated
    /// delay, falls back to an additive increment so growth stays bounded
    /// near the cap. Returns (old, new) in seconds.
    pub fn raise_delay(&self, domain: &str, default_secs: f64) -> (f64, f64) {
        let mut domains = self.domains.lock().unwrap();
        let policy = domains.entry(domain.to_string()).or_default();
        let current = policy.crawl_delay_secs.unwrap_or(default_secs);
        // Doubling a zero baseline would never move it
        let mut raised = (current.max(1.0) * 2.0).min(DELAY_CEILING_SECS);
        if raised == current && current > 1.0 {
            raised = (current + DELAY_INCREMENT_SECS).min(DELAY_CEILING_SECS);
        }
        policy.crawl_delay_secs = Some(raised);
        (current, raised)
    }

    /// Sitemap URLs declared in the domain's cached robots.txt
    pub fn robots_sitemaps(&self, domain: &str) -> Vec<String> {
        let domains = self.domains.lock().unwrap();
        domains
            .get(domain)
            .and_then(|p| p.robots.as_ref())
            .map(|r| r.sitemaps())
            .unwrap_or_default()
    }

    /// Number of domains with any cached state
    pub fn domain_count(&self) -> usize {
        self.domains.lock().unwrap().len()
    }
}

fn effective_delay_of(
    domains: &HashMap<String, DomainPolicy>,
    domain: &str,
    default_secs: f64,
) -> Duration {
    let secs = domains
        .get(domain)
        .and_then(|p| p.crawl_delay_secs)
        .map(|d| d.max(default_secs))
        .unwrap_or(default_secs);
    Duration::from_secs_f64(secs)
}
