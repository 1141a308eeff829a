use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::feed::FeedExtractor;
use super::redirect::RedirectResolver;
use super::search::{ExclusionList, ProviderSet};
use crate::scraping::{BrowserError, BrowserSession, PageDriver, PageSource};
use crate::types::{BatchSummary, Entity, FallbackOrder, ResolutionOutcome};
use crate::ResolverConfig;

/// Drives every entity through its provider fallback chain, then the
/// redirect and feed steps, on a bounded pool of pages.
///
/// Failures stay in-band: each entity ends with exactly one
/// [`ResolutionOutcome`], `(None, None)` when nothing was found or its
/// pipeline failed.
pub struct ResolutionOrchestrator {
    cfg: Arc<ResolverConfig>,
    providers: ProviderSet,
    exclusions: ExclusionList,
    redirect: RedirectResolver,
    feed: FeedExtractor,
}

impl ResolutionOrchestrator {
    pub fn new(cfg: Arc<ResolverConfig>) -> Self {
        let providers = ProviderSet::from_config(&cfg);
        Self::with_providers(cfg, providers)
    }

    pub fn with_providers(cfg: Arc<ResolverConfig>, providers: ProviderSet) -> Self {
        Self {
            exclusions: ExclusionList::new(&cfg.excluded_domains),
            redirect: RedirectResolver::from_config(&cfg),
            feed: FeedExtractor::from_config(&cfg),
            providers,
            cfg,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.cfg
    }

    /// One entity on one page: the first provider returning a URL outside the
    /// exclusion list wins, and only that URL goes through redirect and feed
    /// resolution.
    pub async fn resolve_entity(
        &self,
        page: &dyn PageDriver,
        name: &str,
        order: FallbackOrder,
    ) -> Result<ResolutionOutcome> {
        for id in order {
            let Some(provider) = self.providers.get(id) else {
                debug!("provider {} not configured, skipping", id);
                continue;
            };
            let Some(found) = provider.search(page, name).await? else {
                debug!("{}: no result for '{}'", id, name);
                continue;
            };
            if self.exclusions.is_excluded(&found) {
                info!("🚫 {}: excluded result for '{}': {}", id, name, found);
                continue;
            }

            info!("🔍 {}: '{}' -> {}", id, name, found);
            let url = self.redirect.resolve(page, &found).await;
            let feed = self.feed.extract(page, &url).await;
            return Ok(ResolutionOutcome::resolved(url, feed));
        }
        Ok(ResolutionOutcome::failed())
    }

    /// Resolve a batch. Entities are dispatched in input order; the returned
    /// list is in completion order.
    pub async fn resolve_all(&self, source: &dyn PageSource, entities: Vec<Entity>) -> Vec<Entity> {
        self.run_batch(source, entities)
            .await
            .into_iter()
            .map(|(_, entity)| entity)
            .collect()
    }

    /// Resolve a keyed batch. The fallback rotation follows input order; the
    /// returned pairs keep their keys and come back in completion order.
    pub async fn resolve_keyed(
        &self,
        source: &dyn PageSource,
        entities: Vec<(String, Entity)>,
    ) -> Vec<(String, Entity)> {
        let (keys, values): (Vec<String>, Vec<Entity>) = entities.into_iter().unzip();
        let mut keys: Vec<Option<String>> = keys.into_iter().map(Some).collect();
        self.run_batch(source, values)
            .await
            .into_iter()
            .filter_map(|(index, entity)| keys[index].take().map(|key| (key, entity)))
            .collect()
    }

    /// Fan out over a semaphore of `concurrency` slots and collect
    /// `(input index, entity)` pairs as they complete. Entities still running
    /// at the batch deadline are cancelled and reported unresolved. Their pages
    /// are dropped without `close`: request filters stop at once, the tabs
    /// stay open until the browser session is closed.
    async fn run_batch(&self, source: &dyn PageSource, entities: Vec<Entity>) -> Vec<(usize, Entity)> {
        let started = Instant::now();
        let total = entities.len();
        let concurrency = self.cfg.concurrency.max(1);
        info!(
            "Starting resolution of {} entities (concurrency: {})",
            total, concurrency
        );

        let slots = Semaphore::new(concurrency);
        let mut tasks: FuturesUnordered<_> = entities
            .iter()
            .enumerate()
            .map(|(index, entity)| {
                let order = self.cfg.fallback_order(index);
                let name = entity.name.clone();
                let slots = &slots;
                async move {
                    let outcome = self.run_entity(source, slots, &name, order).await;
                    (index, outcome)
                }
            })
            .collect();

        let mut pending: Vec<Option<Entity>> = entities.into_iter().map(Some).collect();
        let mut done = Vec::with_capacity(total);
        let deadline = self
            .cfg
            .batch_timeout()
            .map(|t| tokio::time::Instant::now() + t);

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            "⏱️ Batch deadline reached with {} entities unfinished",
                            tasks.len()
                        );
                        break;
                    }
                },
                None => tasks.next().await,
            };
            let Some((index, outcome)) = next else {
                break;
            };
            if let Some(mut entity) = pending[index].take() {
                entity.apply(outcome);
                done.push((index, entity));
            }
        }
        drop(tasks);

        for (index, slot) in pending.iter_mut().enumerate() {
            if let Some(mut entity) = slot.take() {
                entity.apply(ResolutionOutcome::failed());
                done.push((index, entity));
            }
        }

        let summary = BatchSummary::from_entities(done.iter().map(|(_, e)| e));
        info!(
            "Resolution completed: {}/{} resolved, {} with feed, {} failed, {}ms total",
            summary.resolved,
            summary.total,
            summary.with_feed,
            summary.failed,
            started.elapsed().as_millis()
        );
        done
    }

    /// Slot, page, pipeline, close, pacing. The slot is held until the
    /// pacing delay has elapsed.
    async fn run_entity(
        &self,
        source: &dyn PageSource,
        slots: &Semaphore,
        name: &str,
        order: FallbackOrder,
    ) -> ResolutionOutcome {
        let Ok(_permit) = slots.acquire().await else {
            return ResolutionOutcome::failed();
        };

        let outcome = match source.open_page().await {
            Ok(page) => {
                let outcome = self.guarded(page.as_ref(), name, order).await;
                if let Err(e) = page.close().await {
                    debug!("closing page for '{}' failed: {}", name, e);
                }
                outcome
            }
            Err(e) => {
                error!("❌ Error for {}: could not open page: {}", name, e);
                ResolutionOutcome::failed()
            }
        };

        tokio::time::sleep(self.cfg.pacing()).await;
        outcome
    }

    /// Entity boundary: errors and panics become `(None, None)`.
    async fn guarded(
        &self,
        page: &dyn PageDriver,
        name: &str,
        order: FallbackOrder,
    ) -> ResolutionOutcome {
        match AssertUnwindSafe(self.resolve_entity(page, name, order))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => {
                if !outcome.is_resolved() {
                    info!("⚠️ No result for {}", name);
                }
                outcome
            }
            Ok(Err(e)) => {
                error!("❌ Error for {}: {:#}", name, e);
                ResolutionOutcome::failed()
            }
            Err(panic) => {
                error!("❌ Error for {}: panicked: {}", name, panic_message(&*panic));
                ResolutionOutcome::failed()
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Open one browser session, resolve the keyed batch on it and close it again,
/// whatever happened in between.
pub async fn run_with_browser(
    cfg: Arc<ResolverConfig>,
    entities: Vec<(String, Entity)>,
) -> Result<Vec<(String, Entity)>, BrowserError> {
    let session = BrowserSession::open(&cfg.browser).await?;
    let orchestrator = ResolutionOrchestrator::new(cfg);
    let resolved = orchestrator.resolve_keyed(&session, entities).await;
    session.close().await;
    Ok(resolved)
}
