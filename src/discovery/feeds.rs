//! RSS/Atom feed handling: parsing entries and discovering feed URLs

use crate::{HoundError, Result};
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use url::Url;

/// MIME types advertised by `<link rel="alternate">` feed references
const FEED_TYPES: &[&str] = &["application/rss+xml", "application/atom+xml"];

/// One entry pulled out of a feed
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Stable identifier: the feed's entry id, or the link when the feed
    /// provides no id
    pub id: String,
    pub link: String,
    pub title: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Parses a feed body into entries.
///
/// Entries without a link are skipped: there is nothing to fetch for them.
/// The publication date falls back to the entry's updated timestamp.
pub fn parse_feed(content: &str, feed_url: &str) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(content.as_bytes()).map_err(|e| HoundError::FeedParse {
        url: feed_url.to_string(),
        message: e.to_string(),
    })?;

    let mut entries = Vec::new();
    for entry in feed.entries {
        let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
            tracing::debug!("Skipping feed entry without link in {}", feed_url);
            continue;
        };

        let id = if entry.id.trim().is_empty() {
            link.clone()
        } else {
            entry.id.clone()
        };

        let published = entry.published.or(entry.updated);

        entries.push(FeedEntry {
            id,
            link,
            title: entry.title.map(|t| t.content),
            published,
        });
    }

    Ok(entries)
}

/// Finds feed URLs advertised in a page's `<link rel="alternate">` tags.
///
/// Relative hrefs are resolved against the page URL. Order of appearance
/// is preserved; the first result is the page's preferred feed.
pub fn find_feed_links_in_html(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(r#"link[rel="alternate"]"#) else {
        return Vec::new();
    };

    let mut feeds = Vec::new();
    for link in document.select(&selector) {
        let Some(link_type) = link.value().attr("type") else {
            continue;
        };
        if !FEED_TYPES.contains(&link_type) {
            continue;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Ok(resolved) = page_url.join(href) {
            let resolved = resolved.to_string();
            if !feeds.contains(&resolved) {
                feeds.push(resolved);
            }
        }
    }
    feeds
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel>
            <title>Example News</title>
            <item>
                <guid>urn:example:1</guid>
                <title>First story</title>
                <link>https://example.com/stories/1</link>
                <pubDate>Sun, 15 Mar 2026 10:30:00 GMT</pubDate>
            </item>
            <item>
                <title>No link here</title>
            </item>
            <item>
                <title>Undated story</title>
                <link>https://example.com/stories/2</link>
            </item>
        </channel></rss>"#;

    #[test]
    fn test_parse_rss_entries() {
        let entries = parse_feed(RSS, "https://example.com/feed.xml").unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].id, "urn:example:1");
        assert_eq!(entries[0].link, "https://example.com/stories/1");
        assert_eq!(entries[0].title.as_deref(), Some("First story"));
        assert!(entries[0].published.is_some());

        assert_eq!(entries[1].link, "https://example.com/stories/2");
        assert!(entries[1].published.is_none());
    }

    #[test]
    fn test_parse_atom_uses_updated() {
        let atom = r#"<?xml version="1.0"?>
            <feed xmlns="http://www.w3.org/2005/Atom">
                <title>Example</title>
                <entry>
                    <id>urn:example:a</id>
                    <title>Atom story</title>
                    <link href="https://example.com/a"/>
                    <updated>2026-03-15T10:30:00Z</updated>
                </entry>
            </feed>"#;

        let entries = parse_feed(atom, "https://example.com/atom.xml").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].published.is_some());
    }

    #[test]
    fn test_parse_invalid_feed_is_error() {
        let err = parse_feed("this is not xml", "https://example.com/feed").unwrap_err();
        assert!(matches!(err, HoundError::FeedParse { .. }));
    }

    #[test]
    fn test_find_feed_links() {
        let html = r#"<html><head>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml"/>
            <link rel="alternate" type="application/atom+xml"
                  href="https://example.com/atom.xml"/>
            <link rel="alternate" type="text/html" href="/mobile"/>
            <link rel="stylesheet" href="/style.css"/>
        </head><body></body></html>"#;

        let base = Url::parse("https://example.com/").unwrap();
        let feeds = find_feed_links_in_html(html, &base);
        assert_eq!(
            feeds,
            vec![
                "https://example.com/feed.xml".to_string(),
                "https://example.com/atom.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_feed_links() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(find_feed_links_in_html("<html><head></head></html>", &base).is_empty());
    }
}
