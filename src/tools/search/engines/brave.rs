use async_trait::async_trait;

use super::{build_search_url, recover, EngineError, EngineSettings};
use crate::scraping::PageDriver;
use crate::tools::search::SearchProvider;
use crate::types::ProviderId;

const SEARCH_BASE: &str = "https://search.brave.com/search";
pub const RESULT_LINKS: &str = "#results > div > a";

/// Single-result engine: the first few links are scanned for a release page.
#[derive(Debug, Clone)]
pub struct BraveProvider {
    settings: EngineSettings,
    max_results: usize,
}

impl BraveProvider {
    pub fn new(settings: EngineSettings, max_results: usize) -> Self {
        Self {
            settings,
            max_results,
        }
    }

    pub fn search_url(&self, keyword: &str) -> Result<url::Url, EngineError> {
        let query = self
            .settings
            .site_query(keyword, Some(self.settings.release_keyword()));
        build_search_url(SEARCH_BASE, &[("q", &query)])
    }

    async fn run(&self, page: &dyn PageDriver, keyword: &str) -> Result<Option<String>, EngineError> {
        let url = self.search_url(keyword)?;
        page.goto(url.as_str(), self.settings.navigation_timeout)
            .await?;
        self.settings.captcha.dismiss(page).await;

        let hrefs = page.attributes(RESULT_LINKS, "href").await?;
        Ok(pick_release_link(
            hrefs,
            &self.settings.canonical_host,
            &self.settings.release_marker,
            self.max_results,
        ))
    }
}

/// First of the leading `limit` links that points at `host` and a release path.
pub fn pick_release_link(
    hrefs: Vec<Option<String>>,
    host: &str,
    marker: &str,
    limit: usize,
) -> Option<String> {
    hrefs
        .into_iter()
        .take(limit)
        .flatten()
        .find(|href| href.contains(host) && href.contains(marker))
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Brave
    }

    async fn search(&self, page: &dyn PageDriver, keyword: &str) -> anyhow::Result<Option<String>> {
        recover(self.id(), keyword, self.run(page, keyword).await)
    }
}
