pub mod engines;
mod service;

use crate::nlp::UrlScorer;
use crate::types::ProviderId;
use crate::ResolverConfig;
use aho_corasick::AhoCorasick;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use engines::{BingProvider, BraveProvider, EngineSettings, MojeekProvider};
pub use service::SearchProvider;

/// The providers an orchestrator can pick from, looked up by id.
#[derive(Clone)]
pub struct ProviderSet {
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl ProviderSet {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        Self { providers }
    }

    /// Brave, Mojeek and Bing wired from `cfg`.
    pub fn from_config(cfg: &ResolverConfig) -> Self {
        let settings = EngineSettings::from_config(cfg);
        Self::new(vec![
            Arc::new(BraveProvider::new(
                settings.clone(),
                cfg.search.brave_max_results,
            )),
            Arc::new(MojeekProvider::new(
                settings.clone(),
                cfg.search.mojeek_max_results,
                UrlScorer::new(cfg.min_score),
                Duration::from_millis(cfg.search.release_page_timeout_ms),
            )),
            Arc::new(BingProvider::new(
                settings,
                Duration::from_millis(cfg.search.bing_results_timeout_ms),
            )),
        ])
    }

    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn SearchProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.id()))
            .finish()
    }
}

/// Low-signal domains vetoed before the redirect and feed steps.
#[derive(Debug, Clone)]
pub struct ExclusionList {
    matcher: Option<AhoCorasick>,
}

impl ExclusionList {
    pub fn new(domains: &[String]) -> Self {
        let patterns: Vec<String> = domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        if patterns.is_empty() {
            return Self { matcher: None };
        }
        let matcher = match AhoCorasick::new(&patterns) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("exclusion list disabled: {}", e);
                None
            }
        };
        Self { matcher }
    }

    /// `true` when the URL's host contains any excluded domain.
    pub fn is_excluded(&self, url: &str) -> bool {
        let Some(matcher) = &self.matcher else {
            return false;
        };
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        matcher.is_match(host.to_ascii_lowercase().as_str())
    }
}
