use crate::scraping::PageDriver;
use crate::types::ProviderId;
use anyhow::Result;
use async_trait::async_trait;

/// One search surface: `(page, keyword) -> url | None`.
///
/// Implementations absorb every browser failure (navigation, timeouts, lost
/// script contexts, closed tabs) as `Ok(None)`. An `Err` is reserved for
/// broken input such as an unparseable candidate URL.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn search(&self, page: &dyn PageDriver, keyword: &str) -> Result<Option<String>>;
}
