//! Scripted in-memory browser used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use feedscout::scraping::{BrowserError, PageDriver, PageSource};
use feedscout::search::SearchProvider;
use feedscout::types::ProviderId;
use feedscout::ResolverConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Defaults with every wait shrunk to a few milliseconds.
pub fn fast_config() -> ResolverConfig {
    let mut cfg = ResolverConfig::default();
    cfg.pacing_ms = 1;
    cfg.captcha.click_timeout_ms = 20;
    cfg.captcha.wait_ms = 1;
    cfg.search.navigation_timeout_ms = 200;
    cfg.search.release_page_timeout_ms = 200;
    cfg.search.bing_results_timeout_ms = 20;
    cfg.redirect.navigation_base_ms = 100;
    cfg.redirect.network_idle_base_ms = 10;
    cfg.redirect.settle_base_ms = 1;
    cfg.redirect.retry_sleep_ms = 1;
    cfg.feed.navigation_timeout_ms = 200;
    cfg.feed.settle_ms = 1;
    cfg
}

/// How a scripted navigation misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Transient: `BrowserError::Navigation`.
    Navigation,
    /// Not transient: the tab is gone.
    Closed,
}

/// What the browser shows after navigating to a route.
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    /// Location after redirects; the requested URL when `None`.
    pub final_url: Option<String>,
    pub title: String,
    /// `selector -> attribute values`. Nested lookups use `"{container} >> {child}"`.
    pub attrs: HashMap<String, Vec<Option<String>>>,
    /// Visible button labels.
    pub buttons: Vec<String>,
    pub click_fails: bool,
    /// Script reads fail as if the document was swapped out mid-read.
    pub read_fails: bool,
    pub failure: Option<Failure>,
    pub delay: Duration,
}

impl FakeResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect_to(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn links(mut self, selector: &str, hrefs: &[&str]) -> Self {
        self.attrs.insert(
            selector.to_string(),
            hrefs.iter().map(|h| Some(h.to_string())).collect(),
        );
        self
    }

    pub fn child_links(self, container: &str, child: &str, hrefs: &[&str]) -> Self {
        self.links(&format!("{} >> {}", container, child), hrefs)
    }

    pub fn button(mut self, label: &str) -> Self {
        self.buttons.push(label.to_string());
        self
    }

    pub fn click_fails(mut self) -> Self {
        self.click_fails = true;
        self
    }

    pub fn read_fails(mut self) -> Self {
        self.read_fails = true;
        self
    }

    pub fn fails(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Route table: exact URLs first, then the longest matching prefix.
#[derive(Debug, Default)]
pub struct FakeWeb {
    exact: HashMap<String, FakeResponse>,
    prefixes: Vec<(String, FakeResponse)>,
    visits: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, response: FakeResponse) -> Self {
        self.exact.insert(url.to_string(), response);
        self
    }

    pub fn route_prefix(mut self, prefix: &str, response: FakeResponse) -> Self {
        self.prefixes.push((prefix.to_string(), response));
        self
    }

    fn lookup(&self, url: &str) -> Option<FakeResponse> {
        if let Some(r) = self.exact.get(url) {
            return Some(r.clone());
        }
        self.prefixes
            .iter()
            .filter(|(p, _)| url.starts_with(p.as_str()))
            .max_by_key(|(p, _)| p.len())
            .map(|(_, r)| r.clone())
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn visits_to(&self, prefix: &str) -> usize {
        self.visits()
            .iter()
            .filter(|v| v.starts_with(prefix))
            .count()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }
}

struct Loaded {
    url: String,
    response: FakeResponse,
}

/// Page lifecycle log: `("open" | "close", when)`.
pub type PageEvents = Arc<Mutex<Vec<(&'static str, Instant)>>>;

pub struct FakePage {
    web: Arc<FakeWeb>,
    current: Mutex<Option<Loaded>>,
    open: Option<Arc<AtomicUsize>>,
    events: Option<PageEvents>,
}

impl FakePage {
    pub fn new(web: Arc<FakeWeb>) -> Self {
        Self {
            web,
            current: Mutex::new(None),
            open: None,
            events: None,
        }
    }

    fn with_current<T>(&self, f: impl FnOnce(&FakeResponse) -> T) -> Option<T> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|loaded| f(&loaded.response))
    }

    fn attr_list(&self, key: &str) -> Result<Vec<Option<String>>, BrowserError> {
        match self.with_current(|r| (r.read_fails, r.attrs.get(key).cloned())) {
            Some((true, _)) => Err(BrowserError::Protocol(
                "Execution context was destroyed".to_string(),
            )),
            Some((false, values)) => Ok(values.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.web.visits.lock().unwrap().push(url.to_string());
        let Some(response) = self.web.lookup(url) else {
            *self.current.lock().unwrap() = None;
            return Err(BrowserError::navigation(url, "net::ERR_NAME_NOT_RESOLVED"));
        };

        if response.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(BrowserError::timeout(format!("navigation to {url}"), timeout));
        }
        tokio::time::sleep(response.delay).await;

        match response.failure {
            Some(Failure::Navigation) => {
                Err(BrowserError::navigation(url, "net::ERR_CONNECTION_RESET"))
            }
            Some(Failure::Closed) => Err(BrowserError::Closed),
            None => {
                *self.current.lock().unwrap() = Some(Loaded {
                    url: url.to_string(),
                    response,
                });
                Ok(())
            }
        }
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if self.count(selector).await? > 0 {
            Ok(())
        } else {
            Err(BrowserError::timeout(
                format!("waiting for selector {selector}"),
                timeout,
            ))
        }
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self
            .current
            .lock()
            .unwrap()
            .as_ref()
            .map(|l| l.response.final_url.clone().unwrap_or_else(|| l.url.clone()))
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.with_current(|r| r.title.clone()).unwrap_or_default())
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        Ok(self.attr_list(selector)?.len())
    }

    async fn attributes(
        &self,
        selector: &str,
        _attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError> {
        self.attr_list(selector)
    }

    async fn child_attributes(
        &self,
        container: &str,
        child: &str,
        _attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError> {
        self.attr_list(&format!("{} >> {}", container, child))
    }

    async fn click_text(
        &self,
        _selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let needle = text.to_lowercase();
        let state = self.with_current(|r| {
            let found = r.buttons.iter().find(|b| b.to_lowercase().contains(&needle));
            (found.cloned(), r.click_fails)
        });
        match state {
            Some((Some(_), true)) => Err(BrowserError::timeout("click", timeout)),
            Some((Some(label), false)) => {
                self.web.clicks.lock().unwrap().push(label);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        if let Some(open) = &self.open {
            open.fetch_sub(1, Ordering::SeqCst);
        }
        if let Some(events) = &self.events {
            events.lock().unwrap().push(("close", Instant::now()));
        }
        Ok(())
    }
}

/// Hands out [`FakePage`]s over one [`FakeWeb`] and tracks how many are open.
pub struct FakeSource {
    pub web: Arc<FakeWeb>,
    open: Arc<AtomicUsize>,
    max_open: AtomicUsize,
    opened: AtomicUsize,
    events: PageEvents,
    fail_open: bool,
}

impl FakeSource {
    pub fn new(web: FakeWeb) -> Self {
        Self {
            web: Arc::new(web),
            open: Arc::new(AtomicUsize::new(0)),
            max_open: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            events: Arc::new(Mutex::new(Vec::new())),
            fail_open: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new(FakeWeb::new())
        }
    }

    pub fn open_now(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<(&'static str, Instant)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        if self.fail_open {
            return Err(BrowserError::Protocol("target crashed".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(("open", Instant::now()));
        Ok(Box::new(FakePage {
            web: Arc::clone(&self.web),
            current: Mutex::new(None),
            open: Some(Arc::clone(&self.open)),
            events: Some(Arc::clone(&self.events)),
        }))
    }
}

/// Canned provider behaviour for one keyword.
#[derive(Debug, Clone)]
pub enum Script {
    Found(String),
    Fail(String),
    Panic,
}

/// A provider answering from a keyword table; unknown keywords yield `None`.
pub struct ScriptedProvider {
    id: ProviderId,
    answers: HashMap<String, Script>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            answers: HashMap::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, keyword: &str, script: Script) -> Self {
        self.answers.insert(keyword.to_string(), script);
        self
    }

    pub fn found(self, keyword: &str, url: &str) -> Self {
        self.answer(keyword, Script::Found(url.to_string()))
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn search(&self, _page: &dyn PageDriver, keyword: &str) -> anyhow::Result<Option<String>> {
        self.calls.lock().unwrap().push(keyword.to_string());
        tokio::time::sleep(self.delay).await;
        match self.answers.get(keyword) {
            Some(Script::Found(url)) => Ok(Some(url.clone())),
            Some(Script::Fail(msg)) => Err(anyhow::anyhow!("{}", msg)),
            Some(Script::Panic) => panic!("scripted provider panic for {}", keyword),
            None => Ok(None),
        }
    }
}
