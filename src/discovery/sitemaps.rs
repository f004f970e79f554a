//! Sitemap parsing
//!
//! Handles both sitemap flavors: `<sitemapindex>` files that point at
//! child sitemaps, and `<urlset>` files that list page URLs with optional
//! `<lastmod>` timestamps. Nesting is the caller's concern; this module
//! parses one document at a time.

use crate::extract::parse_date_utc;
use crate::{HoundError, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

/// One page reference in a `<urlset>` sitemap
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod_utc: Option<DateTime<Utc>>,
}

/// A parsed sitemap document
#[derive(Debug)]
pub enum SitemapFile {
    /// A sitemap index: URLs of child sitemaps
    Index(Vec<String>),
    /// A page list
    UrlSet(Vec<SitemapEntry>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    None,
    Loc,
    Lastmod,
}

/// Parses one sitemap document.
///
/// Tolerates unknown elements (news/image extensions and the like); fails
/// only on malformed XML or a root element that is not a sitemap.
pub fn parse_sitemap(content: &str, url: &str) -> Result<SitemapFile> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let parse_error = |message: String| HoundError::SitemapParse {
        url: url.to_string(),
        message,
    };

    let mut is_index: Option<bool> = None;
    let mut child_sitemaps: Vec<String> = Vec::new();
    let mut entries: Vec<SitemapEntry> = Vec::new();

    let mut in_entry = false;
    let mut field = Field::None;
    let mut loc = String::new();
    let mut lastmod = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = Some(true),
                b"urlset" => is_index = Some(false),
                b"sitemap" | b"url" => {
                    in_entry = true;
                    loc.clear();
                    lastmod.clear();
                }
                b"loc" if in_entry => field = Field::Loc,
                b"lastmod" if in_entry => field = Field::Lastmod,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| parse_error(e.to_string()))?;
                match field {
                    Field::Loc => loc.push_str(&text),
                    Field::Lastmod => lastmod.push_str(&text),
                    Field::None => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"loc" | b"lastmod" => field = Field::None,
                b"sitemap" | b"url" if in_entry => {
                    in_entry = false;
                    let loc = loc.trim().to_string();
                    if loc.is_empty() {
                        continue;
                    }
                    match is_index {
                        Some(true) => child_sitemaps.push(loc),
                        Some(false) => entries.push(SitemapEntry {
                            loc,
                            lastmod_utc: parse_date_utc(lastmod.trim()),
                        }),
                        None => {}
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(parse_error(e.to_string())),
        }
    }

    match is_index {
        Some(true) => Ok(SitemapFile::Index(child_sitemaps)),
        Some(false) => Ok(SitemapFile::UrlSet(entries)),
        None => Err(parse_error("no sitemapindex or urlset root".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url>
                    <loc>https://example.com/stories/1</loc>
                    <lastmod>2026-03-15T10:30:00+00:00</lastmod>
                </url>
                <url>
                    <loc>https://example.com/stories/2</loc>
                </url>
            </urlset>"#;

        let SitemapFile::UrlSet(entries) =
            parse_sitemap(xml, "https://example.com/sitemap.xml").unwrap()
        else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].loc, "https://example.com/stories/1");
        assert_eq!(
            entries[0].lastmod_utc,
            Some(Utc.with_ymd_and_hms(2026, 3, 15, 10, 30, 0).unwrap())
        );
        assert!(entries[1].lastmod_utc.is_none());
    }

    #[test]
    fn test_parse_index() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <sitemap>
                    <loc>https://example.com/sitemap-news.xml</loc>
                    <lastmod>2026-03-15</lastmod>
                </sitemap>
                <sitemap>
                    <loc>https://example.com/sitemap-archive.xml</loc>
                </sitemap>
            </sitemapindex>"#;

        let SitemapFile::Index(children) =
            parse_sitemap(xml, "https://example.com/sitemap.xml").unwrap()
        else {
            panic!("expected index");
        };
        assert_eq!(
            children,
            vec![
                "https://example.com/sitemap-news.xml".to_string(),
                "https://example.com/sitemap-archive.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_bare_date_lastmod() {
        let xml = r#"<urlset><url>
            <loc>https://example.com/a</loc>
            <lastmod>2026-03-10</lastmod>
        </url></urlset>"#;

        let SitemapFile::UrlSet(entries) =
            parse_sitemap(xml, "https://example.com/sitemap.xml").unwrap()
        else {
            panic!("expected urlset");
        };
        assert_eq!(
            entries[0].lastmod_utc,
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unknown_elements_tolerated() {
        let xml = r#"<urlset xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">
            <url>
                <loc>https://example.com/a</loc>
                <news:news><news:title>Extension data</news:title></news:news>
            </url>
        </urlset>"#;

        let SitemapFile::UrlSet(entries) =
            parse_sitemap(xml, "https://example.com/sitemap.xml").unwrap()
        else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_non_sitemap_document_is_error() {
        let err = parse_sitemap("<html><body>404</body></html>", "https://example.com/sitemap.xml")
            .unwrap_err();
        assert!(matches!(err, HoundError::SitemapParse { .. }));
    }

    #[test]
    fn test_entry_without_loc_skipped() {
        let xml = r#"<urlset><url><lastmod>2026-03-10</lastmod></url>
            <url><loc>https://example.com/a</loc></url></urlset>"#;

        let SitemapFile::UrlSet(entries) =
            parse_sitemap(xml, "https://example.com/sitemap.xml").unwrap()
        else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 1);
    }
}
