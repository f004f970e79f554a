//! Robots.txt parsing
//!
//! Allow/disallow matching is delegated to the robotstxt crate. The
//! `Crawl-delay` and `Sitemap` directives are not exposed by that crate, so
//! they are parsed by hand here.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data for one domain
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty means allow all)
    content: String,
    /// Explicit allow-all, used when robots.txt is missing or unreadable
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything.
    ///
    /// Used when robots.txt returns 404 or cannot be fetched; crawl-delay
    /// politeness still applies to such domains.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay in seconds for a user agent.
    ///
    /// A delay declared for the specific agent wins over a wildcard delay.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let normalized_agent = user_agent.to_lowercase();
        let mut group_matches_agent = false;
        let mut group_is_wildcard = false;
        let mut agent_delay: Option<f64> = None;
        let mut wildcard_delay: Option<f64> = None;

        for line in self.content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    let agent = value.to_lowercase();
                    group_matches_agent = normalized_agent.contains(&agent) && agent != "*";
                    group_is_wildcard = agent == "*";
                }
                "crawl-delay" => {
                    if let Ok(delay) = value.parse::<f64>() {
                        if group_matches_agent && agent_delay.is_none() {
                            agent_delay = Some(delay);
                        } else if group_is_wildcard && wildcard_delay.is_none() {
                            wildcard_delay = Some(delay);
                        }
                    }
                }
                _ => {}
            }
        }

        agent_delay.or(wildcard_delay)
    }

    /// Extracts `Sitemap:` directive URLs.
    ///
    /// The directive is agent-independent, so every occurrence counts.
    pub fn sitemaps(&self) -> Vec<String> {
        let mut urls = Vec::new();
        for line in self.content.lines() {
            let trimmed = line.trim();
            if trimmed.to_lowercase().starts_with("sitemap:") {
                if let Some((_, value)) = trimmed.split_once(':') {
                    let value = value.trim();
                    if !value.is_empty() && !urls.iter().any(|u| u == value) {
                        urls.push(value.to_string());
                    }
                }
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/any/path", "TestBot"));
        assert!(robots.is_allowed("/admin", "TestBot"));
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_disallow_specific_path() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.is_allowed("/", "TestBot"));
        assert!(robots.is_allowed("/page", "TestBot"));
        assert!(!robots.is_allowed("/admin", "TestBot"));
        assert!(!robots.is_allowed("/admin/users", "TestBot"));
    }

    #[test]
    fn test_specific_agent_disallowed() {
        let content = "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed("/page", "GoodBot"));
        assert!(!robots.is_allowed("/page", "BadBot"));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /x");
        assert_eq!(robots.crawl_delay("AnyBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_prefers_specific_agent() {
        let content = "User-agent: TestBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("TestBot"), Some(5.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_decimal_and_invalid() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 2.5");
        assert_eq!(robots.crawl_delay("TestBot"), Some(2.5));

        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: soon");
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_crawl_delay_missing() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_sitemap_directives() {
        let content = "User-agent: *\nDisallow: /tmp/\nSitemap: https://example.com/sitemap.xml\n\
                       Sitemap: https://example.com/news-sitemap.xml\nSitemap: https://example.com/sitemap.xml";
        let robots = ParsedRobots::from_content(content);
        let sitemaps = robots.sitemaps();
        assert_eq!(sitemaps.len(), 2);
        assert!(sitemaps.contains(&"https://example.com/sitemap.xml".to_string()));
        assert!(sitemaps.contains(&"https://example.com/news-sitemap.xml".to_string()));
    }

    #[test]
    fn test_no_sitemap_directives() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(robots.sitemaps().is_empty());
    }
}
