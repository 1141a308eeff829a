use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::core::config::FeedConfig;
use crate::scraping::PageDriver;
use crate::ResolverConfig;

/// Reads `<link rel="alternate">` feed declarations from a canonical page.
#[derive(Debug, Clone)]
pub struct FeedExtractor {
    selector: String,
    navigation_timeout: Duration,
    settle: Duration,
}

impl FeedExtractor {
    pub fn new(cfg: &FeedConfig) -> Self {
        Self {
            selector: feed_link_selector(&cfg.mime_types),
            navigation_timeout: Duration::from_millis(cfg.navigation_timeout_ms),
            settle: Duration::from_millis(cfg.settle_ms),
        }
    }

    pub fn from_config(cfg: &ResolverConfig) -> Self {
        Self::new(&cfg.feed)
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// First declared feed of `url`, absolute. `None` when the page declares
    /// none or cannot be loaded.
    pub async fn extract(&self, page: &dyn PageDriver, url: &str) -> Option<String> {
        if let Err(e) = page.goto(url, self.navigation_timeout).await {
            warn!("❌ Failed to fetch feed links from {}: {}", url, e);
            return None;
        }
        page.wait(self.settle).await;

        let hrefs = match page.attributes(&self.selector, "href").await {
            Ok(hrefs) => hrefs,
            Err(e) => {
                warn!("❌ Failed to read feed links from {}: {}", url, e);
                return None;
            }
        };

        let base = match page.current_url().await {
            Ok(current) if !current.is_empty() => current,
            _ => url.to_string(),
        };
        let candidates = feed_candidates(hrefs, &base);
        debug!("feed: {} candidate(s) on {}", candidates.len(), base);
        candidates.into_iter().next()
    }
}

/// `link[rel="alternate"][type="…"]` for every MIME type, comma-joined so the
/// browser returns matches in document order.
pub fn feed_link_selector(mime_types: &[String]) -> String {
    mime_types
        .iter()
        .map(|t| format!("link[rel=\"alternate\"][type=\"{}\"]", t))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve every href against `base` and drop repeats, keeping first-seen order.
pub fn feed_candidates(hrefs: Vec<Option<String>>, base: &str) -> Vec<String> {
    let base = Url::parse(base).ok();
    let mut seen = Vec::new();
    for href in hrefs.into_iter().flatten() {
        let href = href.trim();
        if href.is_empty() {
            continue;
        }
        let absolute = match &base {
            Some(base) => match base.join(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            },
            None => match Url::parse(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            },
        };
        if !seen.contains(&absolute) {
            seen.push(absolute);
        }
    }
    seen
}
