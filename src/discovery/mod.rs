//! Discovery: finding candidate article URLs
//!
//! Two structured channels feed the work queue: RSS/Atom feeds and
//! sitemaps. Sources that offer neither are handled by the Planner's
//! fallback crawl, which runs extraction directly on listing pages.

mod feeds;
mod sitemaps;

pub use feeds::{find_feed_links_in_html, parse_feed, FeedEntry};
pub use sitemaps::{parse_sitemap, SitemapEntry, SitemapFile};
