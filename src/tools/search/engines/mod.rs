pub mod bing;
pub mod brave;
pub mod mojeek;

use crate::features::CaptchaGuard;
use crate::nlp::ScoreError;
use crate::scraping::BrowserError;
use crate::types::ProviderId;
use crate::ResolverConfig;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;

pub use bing::BingProvider;
pub use brave::BraveProvider;
pub use mojeek::MojeekProvider;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("fatal: {0}")]
    Fatal(String),
}

/// Settings shared by every provider.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Host every accepted result must point at.
    pub canonical_host: String,
    pub release_marker: String,
    pub excluded_domains: Vec<String>,
    pub navigation_timeout: Duration,
    pub captcha: CaptchaGuard,
}

impl EngineSettings {
    pub fn from_config(cfg: &ResolverConfig) -> Self {
        Self {
            canonical_host: cfg.canonical_host.clone(),
            release_marker: cfg.release_marker.clone(),
            excluded_domains: cfg.excluded_domains.clone(),
            navigation_timeout: Duration::from_millis(cfg.search.navigation_timeout_ms),
            captcha: CaptchaGuard::from_config(&cfg.captcha),
        }
    }

    /// Qualifier word added to release-oriented queries (`/releases` → `releases`).
    pub fn release_keyword(&self) -> &str {
        self.release_marker.trim_matches('/')
    }

    /// `"<keyword>" [qualifier] site:<host>`
    pub fn site_query(&self, keyword: &str, qualifier: Option<&str>) -> String {
        match qualifier {
            Some(q) if !q.is_empty() => {
                format!("\"{}\" {} site:{}", keyword, q, self.canonical_host)
            }
            _ => format!("\"{}\" site:{}", keyword, self.canonical_host),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

/// Build a SERP URL with properly encoded query pairs.
pub fn build_search_url(base: &str, pairs: &[(&str, &str)]) -> Result<Url, EngineError> {
    let mut url = Url::parse(base).map_err(|e| EngineError::Fatal(e.to_string()))?;
    {
        let mut qp = url.query_pairs_mut();
        for (k, v) in pairs {
            qp.append_pair(k, v);
        }
    }
    Ok(url)
}

/// Convert an engine run into the provider contract: every browser failure
/// becomes "no result" so the next provider in line still runs. Only broken
/// scoring input and bad search URLs travel up.
pub fn recover(
    provider: ProviderId,
    keyword: &str,
    result: Result<Option<String>, EngineError>,
) -> anyhow::Result<Option<String>> {
    match result {
        Ok(found) => Ok(found),
        Err(EngineError::Browser(e)) => {
            if e.is_transient() {
                warn!("❌ {} search failed for '{}': {}", provider, keyword, e);
            } else {
                warn!("❌ {} search aborted for '{}': {}", provider, keyword, e);
            }
            Ok(None)
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("{} search for '{}'", provider, keyword))),
    }
}
