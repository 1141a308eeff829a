use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::{build_search_url, recover, EngineError, EngineSettings};
use crate::nlp::UrlScorer;
use crate::scraping::PageDriver;
use crate::tools::search::SearchProvider;
use crate::types::ProviderId;

const SEARCH_BASE: &str = "https://www.mojeek.com/search";
pub const RESULT_ITEMS: &str = "div.results > ul > li";
pub const ITEM_LINK: &str = "a";

/// List engine. Results are noisy, so candidates on the canonical host are
/// scored and the winner is upgraded to its release page when one exists.
#[derive(Debug, Clone)]
pub struct MojeekProvider {
    settings: EngineSettings,
    max_results: usize,
    scorer: UrlScorer,
    release_page_timeout: Duration,
}

impl MojeekProvider {
    pub fn new(
        settings: EngineSettings,
        max_results: usize,
        scorer: UrlScorer,
        release_page_timeout: Duration,
    ) -> Self {
        Self {
            settings,
            max_results,
            scorer,
            release_page_timeout,
        }
    }

    pub fn search_url(&self, keyword: &str) -> Result<url::Url, EngineError> {
        let query = self.settings.site_query(keyword, None);
        build_search_url(SEARCH_BASE, &[("q", &query)])
    }

    async fn run(&self, page: &dyn PageDriver, keyword: &str) -> Result<Option<String>, EngineError> {
        let url = self.search_url(keyword)?;
        page.goto(url.as_str(), self.settings.navigation_timeout)
            .await?;
        self.settings.captcha.dismiss(page).await;

        let candidates: Vec<String> = page
            .child_attributes(RESULT_ITEMS, ITEM_LINK, "href")
            .await?
            .into_iter()
            .take(self.max_results)
            .flatten()
            .filter(|href| href.contains(&self.settings.canonical_host))
            .collect();
        debug!("mojeek: {} candidates for '{}'", candidates.len(), keyword);

        let Some(best) = self.scorer.choose_best(&candidates, keyword)? else {
            return Ok(None);
        };

        let base = best.trim_end_matches('/');
        if base.ends_with(&self.settings.release_marker) {
            return Ok(Some(best));
        }
        let releases = format!("{}{}", base, self.settings.release_marker);
        match self.release_page_exists(page, &releases).await {
            Ok(true) => Ok(Some(releases)),
            Ok(false) => Ok(Some(best)),
            Err(e) => {
                warn!("❌ Failed to access {} page: {}", self.settings.release_marker, e);
                Ok(Some(best))
            }
        }
    }

    /// `true` when the release page loads and is not a "Not Found" page.
    async fn release_page_exists(&self, page: &dyn PageDriver, url: &str) -> Result<bool, EngineError> {
        page.goto(url, self.release_page_timeout).await?;
        let title = page.title().await?;
        Ok(!title.to_lowercase().contains("not found"))
    }
}

#[async_trait]
impl SearchProvider for MojeekProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Mojeek
    }

    async fn search(&self, page: &dyn PageDriver, keyword: &str) -> anyhow::Result<Option<String>> {
        recover(self.id(), keyword, self.run(page, keyword).await)
    }
}
