use async_trait::async_trait;
use base64::Engine as _;
use std::time::Duration;

use super::{build_search_url, recover, EngineError, EngineSettings};
use crate::scraping::PageDriver;
use crate::tools::search::SearchProvider;
use crate::types::ProviderId;

const SEARCH_BASE: &str = "https://www.bing.com/search";
/// Direct-answer panel link.
pub const ANSWER_LINK: &str = "div.b_tpcn > a";
pub const ORGANIC_LINK: &str = "li.b_algo h2 a";

/// Ranked engine. The query excludes high-traffic community domains and a
/// direct-answer link wins over the first organic result.
#[derive(Debug, Clone)]
pub struct BingProvider {
    settings: EngineSettings,
    results_timeout: Duration,
}

impl BingProvider {
    pub fn new(settings: EngineSettings, results_timeout: Duration) -> Self {
        Self {
            settings,
            results_timeout,
        }
    }

    pub fn query(&self, keyword: &str) -> String {
        let mut query = self
            .settings
            .site_query(keyword, Some(self.settings.release_keyword()));
        for site in &self.settings.excluded_domains {
            query.push_str(" -site:");
            query.push_str(site);
        }
        query
    }

    pub fn search_url(&self, keyword: &str) -> Result<url::Url, EngineError> {
        let query = self.query(keyword);
        build_search_url(
            SEARCH_BASE,
            &[("q", &query), ("setlang", "en-us"), ("cc", "US")],
        )
    }

    async fn run(&self, page: &dyn PageDriver, keyword: &str) -> Result<Option<String>, EngineError> {
        let url = self.search_url(keyword)?;
        page.goto(url.as_str(), self.settings.navigation_timeout)
            .await?;
        page.wait_for_selector(ORGANIC_LINK, self.results_timeout)
            .await?;

        for selector in [ANSWER_LINK, ORGANIC_LINK] {
            let first = page
                .attributes(selector, "href")
                .await?
                .into_iter()
                .next()
                .flatten();
            if let Some(href) = first.as_deref().and_then(normalize_bing_href) {
                return Ok(Some(href));
            }
        }
        Ok(None)
    }
}

/// Unwrap Bing `/ck/` tracking links to their target when possible.
pub fn normalize_bing_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let Ok(url) = url::Url::parse(href) else {
        return Some(href.to_string());
    };

    if matches!(url.host_str(), Some("www.bing.com") | Some("bing.com"))
        && url.path().starts_with("/ck/")
    {
        for (k, v) in url.query_pairs() {
            if k == "u" && !v.trim().is_empty() {
                // Observed format: u=a1<base64url(target)>
                let raw = v.trim_start_matches("a1");
                if let Some(decoded) = decode_target(raw) {
                    return Some(decoded);
                }
                break;
            }
        }
    }

    Some(href.to_string())
}

fn decode_target(raw: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    let bytes = URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(raw))
        .ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let decoded = decoded.trim();
    if decoded.starts_with("http://") || decoded.starts_with("https://") {
        Some(decoded.to_string())
    } else {
        None
    }
}

#[async_trait]
impl SearchProvider for BingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Bing
    }

    async fn search(&self, page: &dyn PageDriver, keyword: &str) -> anyhow::Result<Option<String>> {
        recover(self.id(), keyword, self.run(page, keyword).await)
    }
}
