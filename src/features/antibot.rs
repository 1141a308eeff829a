use crate::core::config::CaptchaConfig;
use crate::scraping::PageDriver;
use std::time::Duration;
use tracing::{info, warn};

/// Best-effort dismissal of a simple "I'm not a robot" interstitial.
///
/// Never fails: a missing button, a click timeout or a detached element all
/// come back as `false` so the calling provider carries on.
#[derive(Debug, Clone)]
pub struct CaptchaGuard {
    label: String,
    click_timeout: Duration,
    wait: Duration,
}

impl CaptchaGuard {
    pub fn new(label: impl Into<String>, click_timeout: Duration, wait: Duration) -> Self {
        Self {
            label: label.into(),
            click_timeout,
            wait,
        }
    }

    pub fn from_config(cfg: &CaptchaConfig) -> Self {
        Self::new(
            cfg.label.clone(),
            Duration::from_millis(cfg.click_timeout_ms),
            Duration::from_millis(cfg.wait_ms),
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` only when the button was found and clicked.
    pub async fn dismiss(&self, page: &dyn PageDriver) -> bool {
        match page.click_text("button", &self.label, self.click_timeout).await {
            Ok(false) => false,
            Ok(true) => {
                info!("🤖 clicked '{}' interstitial, waiting {}ms", self.label, self.wait.as_millis());
                page.wait(self.wait).await;
                true
            }
            Err(e) => {
                warn!("❌ Failed to click CAPTCHA button: {}", e);
                false
            }
        }
    }
}

impl Default for CaptchaGuard {
    fn default() -> Self {
        Self::from_config(&CaptchaConfig::default())
    }
}
