//! Native browser management using `chromiumoxide`.
//!
//! This module owns:
//! * Finding a usable browser executable (Brave → Chrome → Chromium, cross-platform).
//! * [`BrowserSession`]: one browser process shared by every worker, handing
//!   out tabs that already carry the identity profile and request filter.
//! * `wait_until_stable`, the networkidle heuristic used by [`CdpPage`].
//!
//! Resource blocking happens through the CDP `Fetch` domain: requests whose
//! resource type is configured as blocked are paused by the browser and then
//! failed as `BlockedByClient`. DOM text is unaffected.

use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams as FetchEnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, Headers, ResourceType, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::SetBypassCspParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::page::{BrowserError, CdpPage, PageDriver};
use crate::core::config::{chrome_executable_override, BrowserSettings};

// ── Realistic User-Agent pool ────────────────────────────────────────────────

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 132 – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 131 – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Edge 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen realistic desktop User-Agent string.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    DESKTOP_USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan – finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
            "brave",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
            "/usr/bin/brave-browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

// ── Launch config ────────────────────────────────────────────────────────────

/// Build the `BrowserConfig` for the configured launch flags and viewport.
pub fn build_launch_config(
    exe: &str,
    settings: &BrowserSettings,
    user_agent: &str,
) -> Result<BrowserConfig, BrowserError> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width: settings.viewport_width,
            height: settings.viewport_height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(settings.viewport_width, settings.viewport_height)
        .arg(format!("--user-agent={}", user_agent))
        .arg(format!("--lang={}", settings.locale));

    if !settings.headless {
        builder = builder.with_head();
    }
    for arg in &settings.launch_args {
        builder = builder.arg(arg.as_str());
    }
    if settings.ignore_https_errors {
        builder = builder.arg("--ignore-certificate-errors");
    }

    builder
        .build()
        .map_err(|e| BrowserError::Launch(format!("invalid browser config: {}", e)))
}

/// Map configured resource-type names to CDP resource types. Unknown names are
/// skipped with a warning.
pub fn parse_resource_types(names: &[String]) -> Vec<ResourceType> {
    names
        .iter()
        .filter_map(|name| {
            let parsed = match name.trim().to_ascii_lowercase().as_str() {
                "image" => Some(ResourceType::Image),
                "stylesheet" => Some(ResourceType::Stylesheet),
                "font" => Some(ResourceType::Font),
                "media" => Some(ResourceType::Media),
                "script" => Some(ResourceType::Script),
                "texttrack" => Some(ResourceType::TextTrack),
                "manifest" => Some(ResourceType::Manifest),
                "ping" => Some(ResourceType::Ping),
                _ => None,
            };
            if parsed.is_none() {
                warn!("ignoring unknown blocked resource type '{}'", name);
            }
            parsed
        })
        .collect()
}

// ── Page sources ─────────────────────────────────────────────────────────────

/// Hands out fresh pages that share one browsing context.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, BrowserError>;
}

/// One browser process, opened once per batch and closed once after it.
///
/// Every page from [`BrowserSession::open_page`] gets the same identity
/// profile (user agent, `Accept-Language`/`DNT`, locale, timezone, CSP bypass)
/// and the resource-type request filter.
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    settings: BrowserSettings,
    user_agent: String,
    blocked: Vec<ResourceType>,
}

impl BrowserSession {
    pub async fn open(settings: &BrowserSettings) -> Result<Self, BrowserError> {
        let exe = settings
            .executable
            .clone()
            .or_else(find_chrome_executable)
            .ok_or(BrowserError::NotFound)?;

        let user_agent = if settings.rotate_user_agent {
            random_user_agent().to_string()
        } else {
            settings.user_agent.clone()
        };

        info!(
            "🚀 launching browser ({}, headless={})",
            exe, settings.headless
        );
        let config = build_launch_config(&exe, settings, &user_agent)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(format!("{}: {}", exe, e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
            settings: settings.clone(),
            user_agent,
            blocked: parse_resource_types(&settings.blocked_resource_types),
        })
    }

    async fn apply_profile(&self, page: &Page) -> Result<(), BrowserError> {
        let settings = &self.settings;

        let mut ua = SetUserAgentOverrideParams::new(self.user_agent.clone());
        ua.accept_language = Some(settings.accept_language.clone());
        page.execute(ua).await.map_err(protocol)?;

        if !settings.extra_headers.is_empty() {
            let headers = serde_json::to_value(&settings.extra_headers)
                .map_err(|e| BrowserError::Protocol(e.to_string()))?;
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await
                .map_err(protocol)?;
        }

        page.execute(SetLocaleOverrideParams {
            locale: Some(settings.locale.clone()),
        })
        .await
        .map_err(protocol)?;

        if let Some(tz) = &settings.timezone {
            page.execute(SetTimezoneOverrideParams::new(tz.clone()))
                .await
                .map_err(protocol)?;
        }

        if settings.bypass_csp {
            page.execute(SetBypassCspParams::new(true))
                .await
                .map_err(protocol)?;
        }

        Ok(())
    }

    async fn install_request_filter(
        &self,
        page: &Page,
    ) -> Result<Option<JoinHandle<()>>, BrowserError> {
        if self.blocked.is_empty() {
            return Ok(None);
        }

        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(protocol)?;

        let patterns = self
            .blocked
            .iter()
            .map(|resource_type| RequestPattern {
                url_pattern: Some("*".to_string()),
                resource_type: Some(resource_type.clone()),
                request_stage: Some(RequestStage::Request),
            })
            .collect();
        page.execute(FetchEnableParams {
            patterns: Some(patterns),
            handle_auth_requests: None,
        })
        .await
        .map_err(protocol)?;

        // Only blocked resource types are paused, so every event is failed.
        let page = page.clone();
        Ok(Some(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let fail =
                    FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(e) = page.execute(fail).await {
                    debug!("request filter: could not abort {}: {}", event.request.url, e);
                }
            }
        })))
    }

    /// Gracefully close the browser. Pages still open are discarded with it.
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
            let _ = browser.wait().await;
            info!("🛑 Browser session closed");
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[async_trait]
impl PageSource for BrowserSession {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let browser = self.browser.as_ref().ok_or(BrowserError::Closed)?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Protocol(format!("failed to open tab: {}", e)))?;

        let prepared = async {
            self.apply_profile(&page).await?;
            self.install_request_filter(&page).await
        }
        .await;

        match prepared {
            Ok(filter) => Ok(Box::new(CdpPage::new(page, filter))),
            Err(e) => {
                if let Err(close_err) = page.close().await {
                    debug!("closing half-initialised tab failed: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Drop cannot await; if we're inside a tokio runtime, spawn a task to
        // close the browser to avoid zombie Chromium processes.
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            let _ = browser.close().await;
        });
    }
}

fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

// ── Smart wait / networkidle ─────────────────────────────────────────────────

/// Wait until the page network goes idle (no new resource entries for `quiet_ms`
/// consecutive ms) or until `timeout_ms` has elapsed.
///
/// Polls `performance.getEntriesByType("resource").length` every 250 ms.
pub async fn wait_until_stable(page: &Page, quiet_ms: u64, timeout_ms: u64) {
    let poll_ms = 250u64;
    let start = std::time::Instant::now();
    let mut last_count: u64 = 0;
    let mut stable_since = std::time::Instant::now();

    loop {
        if start.elapsed().as_millis() as u64 >= timeout_ms {
            debug!("wait_until_stable: timeout after {}ms", timeout_ms);
            break;
        }

        let count: u64 = page
            .evaluate("performance.getEntriesByType('resource').length")
            .await
            .ok()
            .and_then(|v| v.into_value::<serde_json::Value>().ok())
            .and_then(|j| j.as_u64())
            .unwrap_or(0);

        let ready_complete: bool = page
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|v| v.into_value::<serde_json::Value>().ok())
            .and_then(|j| j.as_str().map(|s| s == "complete"))
            .unwrap_or(false);

        if !ready_complete {
            stable_since = std::time::Instant::now();
            last_count = count;
        } else if count != last_count {
            last_count = count;
            stable_since = std::time::Instant::now();
        } else if stable_since.elapsed().as_millis() as u64 >= quiet_ms {
            debug!(
                "wait_until_stable: idle after {}ms ({} resources)",
                start.elapsed().as_millis(),
                count
            );
            break;
        }

        tokio::time::sleep(Duration::from_millis(poll_ms)).await;
    }
}
