use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::RedirectConfig;
use crate::scraping::{BrowserError, PageDriver};
use crate::ResolverConfig;

/// Follows a search hit until the page settles on the canonical host.
///
/// Budgets grow linearly with the attempt number, so a slow redirect chain
/// gets more time on every retry. The result is never empty: when the host is
/// never reached the input URL comes back unchanged.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    canonical_host: String,
    max_retries: u32,
    navigation_base: Duration,
    network_idle_base: Duration,
    settle_base: Duration,
    retry_sleep: Duration,
}

impl RedirectResolver {
    pub fn new(canonical_host: impl Into<String>, cfg: &RedirectConfig) -> Self {
        Self {
            canonical_host: canonical_host.into().to_ascii_lowercase(),
            max_retries: cfg.max_retries,
            navigation_base: Duration::from_millis(cfg.navigation_base_ms),
            network_idle_base: Duration::from_millis(cfg.network_idle_base_ms),
            settle_base: Duration::from_millis(cfg.settle_base_ms),
            retry_sleep: Duration::from_millis(cfg.retry_sleep_ms),
        }
    }

    pub fn from_config(cfg: &ResolverConfig) -> Self {
        Self::new(cfg.canonical_host.clone(), &cfg.redirect)
    }

    pub async fn resolve(&self, page: &dyn PageDriver, url: &str) -> String {
        for attempt in 1..=self.max_retries {
            match self.attempt(page, url, attempt).await {
                Ok(Some(landed)) => {
                    debug!("redirect: {} -> {} (attempt {})", url, landed, attempt);
                    return landed;
                }
                Ok(None) => {
                    debug!(
                        "redirect: attempt {} for {} did not reach {}",
                        attempt, url, self.canonical_host
                    );
                }
                Err(e) => {
                    warn!("❌ Redirect attempt {} failed for {}: {}", attempt, url, e);
                }
            }
            tokio::time::sleep(self.retry_sleep).await;
        }
        url.to_string()
    }

    async fn attempt(
        &self,
        page: &dyn PageDriver,
        url: &str,
        attempt: u32,
    ) -> Result<Option<String>, BrowserError> {
        page.goto(url, self.navigation_base * attempt).await?;
        page.wait_for_network_idle(self.network_idle_base * attempt)
            .await?;
        page.wait(self.settle_base * attempt).await;

        let current = page.current_url().await?;
        Ok(is_on_host(&current, &self.canonical_host).then_some(current))
    }
}

/// Exact host comparison, case-insensitive.
pub fn is_on_host(url: &str, host: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(host)))
        .unwrap_or(false)
}
