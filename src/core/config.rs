use crate::types::{FallbackOrder, ProviderId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ResolverConfig: file-based config loader (feedscout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "FEEDSCOUT_CONFIG";
pub const ENV_CONCURRENCY: &str = "FEEDSCOUT_CONCURRENCY";
pub const ENV_HEADLESS: &str = "FEEDSCOUT_HEADLESS";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

/// Everything the resolver would otherwise read from module-level constants.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct ResolverConfig {
    /// Host a resolved URL must end up on, e.g. `github.com`.
    pub canonical_host: String,
    /// Path marker identifying a release page.
    pub release_marker: String,
    /// Domains vetoed by substring before redirect/feed resolution. Also used
    /// as `-site:` exclusions by the Bing provider.
    pub excluded_domains: Vec<String>,
    /// Entity `i` uses `fallback_orders[i % len]`.
    pub fallback_orders: Vec<FallbackOrder>,
    pub concurrency: usize,
    /// Pause after each entity before its worker slot is released.
    pub pacing_ms: u64,
    /// Optional deadline for the whole batch. Unfinished entities are reported
    /// as unresolved.
    pub batch_timeout_ms: Option<u64>,
    /// Candidates scoring below this are not eligible.
    pub min_score: u32,
    pub captcha: CaptchaConfig,
    pub search: SearchConfig,
    pub redirect: RedirectConfig,
    pub feed: FeedConfig,
    pub browser: BrowserSettings,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            canonical_host: "github.com".to_string(),
            release_marker: "/releases".to_string(),
            excluded_domains: vec![
                "reddit.com".to_string(),
                "wikipedia.org".to_string(),
                "zhihu.com".to_string(),
                "linkedin.com".to_string(),
            ],
            fallback_orders: vec![
                [ProviderId::Brave, ProviderId::Mojeek, ProviderId::Bing],
                [ProviderId::Mojeek, ProviderId::Bing, ProviderId::Brave],
                [ProviderId::Bing, ProviderId::Brave, ProviderId::Mojeek],
            ],
            concurrency: 3,
            pacing_ms: 1000,
            batch_timeout_ms: None,
            min_score: 0,
            captcha: CaptchaConfig::default(),
            search: SearchConfig::default(),
            redirect: RedirectConfig::default(),
            feed: FeedConfig::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl ResolverConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }

    /// Rotation for the entity at `index`. Falls back to the built-in order
    /// when the configured list is empty.
    pub fn fallback_order(&self, index: usize) -> FallbackOrder {
        if self.fallback_orders.is_empty() {
            return ProviderId::ALL;
        }
        self.fallback_orders[index % self.fallback_orders.len()]
    }

    /// Apply `FEEDSCOUT_CONCURRENCY` / `FEEDSCOUT_HEADLESS` on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(n) = std::env::var(ENV_CONCURRENCY)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.concurrency = n;
        }
        if let Ok(v) = std::env::var(ENV_HEADLESS) {
            let v = v.trim().to_ascii_lowercase();
            self.browser.headless = !matches!(v.as_str(), "0" | "false" | "no" | "off");
        }
    }
}

/// Interstitial "I'm not a robot" handling.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct CaptchaConfig {
    pub label: String,
    pub click_timeout_ms: u64,
    /// Wait after a successful click.
    pub wait_ms: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            label: "I'm not a robot".to_string(),
            click_timeout_ms: 3000,
            wait_ms: 5000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct SearchConfig {
    pub navigation_timeout_ms: u64,
    pub brave_max_results: usize,
    pub mojeek_max_results: usize,
    /// Timeout for loading the `/releases` page the Mojeek provider upgrades to.
    pub release_page_timeout_ms: u64,
    /// How long Bing gets to render organic results.
    pub bing_results_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            brave_max_results: 5,
            mojeek_max_results: 10,
            release_page_timeout_ms: 10_000,
            bing_results_timeout_ms: 10_000,
        }
    }
}

/// Per-attempt budgets are multiplied by the 1-based attempt index.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct RedirectConfig {
    pub max_retries: u32,
    pub navigation_base_ms: u64,
    pub network_idle_base_ms: u64,
    pub settle_base_ms: u64,
    pub retry_sleep_ms: u64,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            navigation_base_ms: 10_000,
            network_idle_base_ms: 5_000,
            settle_base_ms: 3_000,
            retry_sleep_ms: 1_000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct FeedConfig {
    pub navigation_timeout_ms: u64,
    pub settle_ms: u64,
    pub mime_types: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 60_000,
            settle_ms: 5_000,
            mime_types: vec![
                "application/atom+xml".to_string(),
                "application/rss+xml".to_string(),
            ],
        }
    }
}

/// Launch flags and the identity every page presents.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<String>,
    pub launch_args: Vec<String>,
    pub locale: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    /// Draw the user agent from the built-in desktop pool instead.
    pub rotate_user_agent: bool,
    pub accept_language: String,
    pub extra_headers: BTreeMap<String, String>,
    pub ignore_https_errors: bool,
    pub bypass_csp: bool,
    pub timezone: Option<String>,
    /// CDP resource types aborted before they hit the network.
    pub blocked_resource_types: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        let accept_language = "en-US,en;q=0.9".to_string();
        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("Accept-Language".to_string(), accept_language.clone());
        extra_headers.insert("DNT".to_string(), "1".to_string());

        Self {
            headless: true,
            executable: None,
            launch_args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-web-security".to_string(),
                "--disable-features=IsolateOrigins,site-per-process".to_string(),
                "--no-sandbox".to_string(),
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-extensions".to_string(),
                "--disable-infobars".to_string(),
            ],
            locale: "en-US".to_string(),
            viewport_width: 1280,
            viewport_height: 720,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36".to_string(),
            rotate_user_agent: false,
            accept_language,
            extra_headers,
            ignore_https_errors: true,
            bypass_csp: true,
            timezone: None,
            blocked_resource_types: vec![
                "image".to_string(),
                "stylesheet".to_string(),
                "font".to_string(),
            ],
        }
    }
}

/// Load `feedscout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `FEEDSCOUT_CONFIG` env var path
/// 2. `./feedscout.json`
/// 3. `~/.feedscout/config.json`
///
/// Missing file → `ResolverConfig::default()`. Parse error → warning and defaults.
/// Env overrides are applied on top either way.
pub fn load_config() -> ResolverConfig {
    let mut candidates = vec![PathBuf::from("feedscout.json")];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".feedscout").join("config.json"));
    }

    let mut cfg = candidates
        .iter()
        .find_map(|path| load_config_from(path))
        .unwrap_or_default();
    cfg.apply_env_overrides();
    cfg
}

/// Read one config file. `None` when it does not exist; defaults when it is
/// unreadable as JSON.
pub fn load_config_from(path: &Path) -> Option<ResolverConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<ResolverConfig>(&contents) {
        Ok(cfg) => {
            tracing::info!("feedscout config loaded from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            tracing::warn!(
                "feedscout config parse error at {}: {}; using defaults",
                path.display(),
                e
            );
            Some(ResolverConfig::default())
        }
    }
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}
