//! Page capability interface.
//!
//! Providers, the redirect resolver and the feed extractor only ever talk to a
//! [`PageDriver`]. The chromiumoxide-backed [`CdpPage`] is the production
//! implementation; tests drive the same code through a scripted double.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::browser_manager;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no browser found; install Brave, Chrome or Chromium, or set CHROME_EXECUTABLE")]
    NotFound,

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{operation} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("devtools protocol error: {0}")]
    Protocol(String),

    #[error("page is closed")]
    Closed,
}

impl BrowserError {
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        BrowserError::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        BrowserError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Network flakiness: recovered locally as "no result".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::Navigation { .. } | BrowserError::Timeout { .. }
        )
    }
}

/// What the resolver needs from a browser tab.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the load event, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until network activity has been quiet for a moment, bounded by `timeout`.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Fixed settle period.
    async fn wait(&self, duration: Duration);

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    async fn count(&self, selector: &str) -> Result<usize, BrowserError>;

    /// `attribute` of every element matching `selector`, in document order.
    async fn attributes(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError>;

    /// For every element matching `container`, `attribute` of its first
    /// descendant matching `child`.
    async fn child_attributes(
        &self,
        container: &str,
        child: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError>;

    /// Click the first element matching `selector` whose visible text contains
    /// `text`. `Ok(false)` when there is no such element.
    async fn click_text(
        &self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError>;

    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// Request-filter task of one tab. Aborted when dropped, so a page future
/// cancelled before `close` does not leave the task running.
struct FilterTask(JoinHandle<()>);

impl Drop for FilterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A chromiumoxide tab plus the task servicing its request filter.
///
/// Dropping a `CdpPage` without calling [`PageDriver::close`] stops the filter
/// task but leaves the tab itself open until the browser session closes.
pub struct CdpPage {
    page: chromiumoxide::Page,
    filter_task: Option<FilterTask>,
}

impl CdpPage {
    pub(crate) fn new(page: chromiumoxide::Page, filter_task: Option<JoinHandle<()>>) -> Self {
        Self {
            page,
            filter_task: filter_task.map(FilterTask),
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, js: String) -> Result<T, BrowserError> {
        let value = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        value
            .into_value::<T>()
            .map_err(|e| BrowserError::Protocol(format!("unexpected script result: {e:?}")))
    }
}

fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        debug!("goto {} ({}ms)", url, timeout.as_millis());
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::navigation(url, e)),
            Err(_) => Err(BrowserError::timeout(format!("navigation to {url}"), timeout)),
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), BrowserError> {
        browser_manager::wait_until_stable(&self.page, 500, timeout.as_millis() as u64).await;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let poll = Duration::from_millis(250);
        let start = std::time::Instant::now();
        loop {
            if self.count(selector).await? > 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(BrowserError::timeout(
                    format!("waiting for selector {selector}"),
                    timeout,
                ));
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        self.eval(format!(
            "document.querySelectorAll({}).length",
            js_str(selector)
        ))
        .await
    }

    async fn attributes(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).map(el => el.getAttribute({}))",
            js_str(selector),
            js_str(attribute)
        ))
        .await
    }

    async fn child_attributes(
        &self,
        container: &str,
        child: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).map(c => {{ const el = c.querySelector({}); return el ? el.getAttribute({}) : null; }})",
            js_str(container),
            js_str(child),
            js_str(attribute)
        ))
        .await
    }

    async fn click_text(
        &self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let elements = match self.page.find_elements(selector).await {
            Ok(els) => els,
            // No match is reported as an error by chromiumoxide.
            Err(_) => return Ok(false),
        };

        let needle = text.to_lowercase();
        for element in elements {
            let visible = element.inner_text().await.ok().flatten().unwrap_or_default();
            if !visible.to_lowercase().contains(&needle) {
                continue;
            }
            return match tokio::time::timeout(timeout, element.click()).await {
                Ok(Ok(_)) => Ok(true),
                Ok(Err(e)) => Err(BrowserError::Protocol(format!("click failed: {e}"))),
                Err(_) => Err(BrowserError::timeout(format!("click on {selector}"), timeout)),
            };
        }
        Ok(false)
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let mut this = self;
        drop(this.filter_task.take());
        this.page.clone().close().await.map_err(|e| {
            warn!("page close failed: {}", e);
            BrowserError::Protocol(e.to_string())
        })
    }
}
