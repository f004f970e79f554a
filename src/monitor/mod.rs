//! Monitor: operational event log, rate-limit detection, recency checks
//!
//! The Monitor is the pipeline's shared observer. Components report
//! failures and suspicious responses to it; it keeps an in-memory event
//! log (mirrored to tracing), decides whether a response looks like a
//! rate limit or bot block, and raises the offending domain's crawl
//! delay through the shared [`PolicyStore`].

use crate::policy::PolicyStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// Response-body phrases that indicate a bot block or soft rate limit
/// even when the HTTP status is 200
const BLOCK_KEYWORDS: &[&str] = &[
    "captcha",
    "are you a robot",
    "access denied",
    "verify you are human",
    "to continue please",
    "too many requests",
];

/// How much of a response body is scanned for block keywords
const SNIPPET_SCAN_LIMIT: usize = 4096;

/// Severity of a monitor event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One structured entry in the monitor's event log
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    /// Free-form context (url, status, source name, old/new delay)
    pub details: BTreeMap<String, String>,
}

/// Shared pipeline observer
#[derive(Debug)]
pub struct Monitor {
    events: Mutex<Vec<LogEvent>>,
    policy: Arc<PolicyStore>,
    default_delay_secs: f64,
}

impl Monitor {
    pub fn new(policy: Arc<PolicyStore>, default_delay_secs: f64) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            policy,
            default_delay_secs,
        }
    }

    /// Appends an event to the log and mirrors it to tracing
    pub fn log_event(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        details: BTreeMap<String, String>,
    ) {
        match level {
            LogLevel::Info => tracing::info!(component, "{}", message),
            LogLevel::Warning => tracing::warn!(component, "{}", message),
            LogLevel::Error => tracing::error!(component, "{}", message),
        }
        let event = LogEvent {
            timestamp: Utc::now(),
            level,
            component: component.to_string(),
            message: message.to_string(),
            details,
        };
        self.events.lock().unwrap().push(event);
    }

    /// Records a non-fatal failure from a component
    pub fn report_failure(&self, component: &str, context: &str, message: &str) {
        let mut details = BTreeMap::new();
        details.insert("context".to_string(), context.to_string());
        self.log_event(LogLevel::Error, component, message, details);
    }

    /// Decides whether a response indicates rate limiting or a bot block,
    /// and if so raises the domain's crawl delay.
    ///
    /// Triggers on HTTP 429 and 503, and on block keywords appearing in the
    /// start of the response body regardless of status. Returns true when
    /// the response was judged a rate limit.
    pub fn is_rate_limited(
        &self,
        component: &str,
        source_identifier: &str,
        status: Option<u16>,
        body_snippet: &str,
    ) -> bool {
        let status_limited = matches!(status, Some(429) | Some(503));

        let scanned = if body_snippet.len() > SNIPPET_SCAN_LIMIT {
            // Char boundary safe truncation
            let mut end = SNIPPET_SCAN_LIMIT;
            while !body_snippet.is_char_boundary(end) {
                end -= 1;
            }
            &body_snippet[..end]
        } else {
            body_snippet
        };
        let lowered = scanned.to_lowercase();
        let keyword_hit = BLOCK_KEYWORDS.iter().find(|k| lowered.contains(*k));

        if !status_limited && keyword_hit.is_none() {
            return false;
        }

        let domain = extract_domain(source_identifier);
        let (old_delay, new_delay) = self.policy.raise_delay(&domain, self.default_delay_secs);

        let mut details = BTreeMap::new();
        details.insert("domain".to_string(), domain.clone());
        details.insert("old_delay_secs".to_string(), old_delay.to_string());
        details.insert("new_delay_secs".to_string(), new_delay.to_string());
        if let Some(status) = status {
            details.insert("status".to_string(), status.to_string());
        }
        if let Some(keyword) = keyword_hit {
            details.insert("keyword".to_string(), keyword.to_string());
        }

        self.log_event(
            LogLevel::Warning,
            component,
            &format!(
                "Rate limit detected for {}; delay raised {:.1}s -> {:.1}s",
                domain, old_delay, new_delay
            ),
            details,
        );
        true
    }

    /// Whether an item's publication date falls inside the recency window.
    ///
    /// Undated items pass: a missing date must never silently drop an item.
    pub fn is_item_new(&self, published: Option<DateTime<Utc>>, recency_days: i64) -> bool {
        match published {
            Some(date) => date >= Utc::now() - Duration::days(recency_days),
            None => true,
        }
    }

    /// Snapshot of the event log
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events at or above warning severity
    pub fn warning_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level != LogLevel::Info)
            .count()
    }
}

/// Pulls a bare domain out of a URL or domain-like string
fn extract_domain(identifier: &str) -> String {
    if let Ok(url) = Url::parse(identifier) {
        if let Some(host) = url.host_str() {
            return host.to_string();
        }
    }
    // Already a bare domain, or something unparseable; strip any path
    identifier
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split('/')
        .next()
        .unwrap_or(identifier)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> Monitor {
        Monitor::new(Arc::new(PolicyStore::new()), 1.0)
    }

    #[test]
    fn test_rate_limit_on_429() {
        let m = monitor();
        assert!(m.is_rate_limited("fetcher", "https://example.com/page", Some(429), ""));
        assert_eq!(m.policy.delay_secs("example.com"), Some(2.0));
    }

    #[test]
    fn test_rate_limit_on_503() {
        let m = monitor();
        assert!(m.is_rate_limited("fetcher", "example.com", Some(503), ""));
    }

    #[test]
    fn test_ok_status_clean_body_passes() {
        let m = monitor();
        assert!(!m.is_rate_limited(
            "fetcher",
            "https://example.com/page",
            Some(200),
            "<html><body>Breaking news</body></html>"
        ));
        assert_eq!(m.policy.delay_secs("example.com"), None);
    }

    #[test]
    fn test_keyword_detection_on_200() {
        let m = monitor();
        assert!(m.is_rate_limited(
            "fetcher",
            "https://example.com/page",
            Some(200),
            "<html>Please solve this CAPTCHA to continue</html>"
        ));
        assert_eq!(m.policy.delay_secs("example.com"), Some(2.0));
    }

    #[test]
    fn test_repeated_detection_doubles_delay() {
        let m = monitor();
        m.is_rate_limited("fetcher", "https://example.com/a", Some(429), "");
        m.is_rate_limited("fetcher", "https://example.com/b", Some(429), "");
        m.is_rate_limited("fetcher", "https://example.com/c", Some(429), "");
        assert_eq!(m.policy.delay_secs("example.com"), Some(8.0));
    }

    #[test]
    fn test_delay_growth_near_ceiling_is_additive() {
        let m = monitor();
        // 1 -> 2 -> 4 -> ... -> 256 -> 300, then additive attempts stay capped
        for _ in 0..20 {
            m.is_rate_limited("fetcher", "https://example.com/", Some(429), "");
        }
        assert_eq!(
            m.policy.delay_secs("example.com"),
            Some(crate::policy::DELAY_CEILING_SECS)
        );
    }

    #[test]
    fn test_domain_extraction_variants() {
        assert_eq!(extract_domain("https://news.example.com/a/b"), "news.example.com");
        assert_eq!(extract_domain("news.example.com"), "news.example.com");
        assert_eq!(extract_domain("news.example.com/path"), "news.example.com");
    }

    #[test]
    fn test_undated_item_is_new() {
        let m = monitor();
        assert!(m.is_item_new(None, 2));
    }

    #[test]
    fn test_recency_window() {
        let m = monitor();
        assert!(m.is_item_new(Some(Utc::now() - Duration::hours(12)), 2));
        assert!(!m.is_item_new(Some(Utc::now() - Duration::days(5)), 2));
    }

    #[test]
    fn test_event_log_records_details() {
        let m = monitor();
        m.report_failure("planner", "https://example.com/feed.xml", "feed unreachable");
        let events = m.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, LogLevel::Error);
        assert_eq!(events[0].component, "planner");
        assert_eq!(m.warning_count(), 1);
    }
}
