use serde::{Deserialize, Serialize};
use std::fmt;

/// A named subject to resolve to a canonical page and update feed.
///
/// `url` and `feed` start out empty and are written once per run by the
/// orchestrator. Any other keys present in the input record are carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "rss")]
    pub feed: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn apply(&mut self, outcome: ResolutionOutcome) {
        self.url = outcome.url;
        self.feed = outcome.feed;
    }
}

/// Terminal value attached to an [`Entity`]. `(None, None)` is an expected
/// outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub url: Option<String>,
    pub feed: Option<String>,
}

impl ResolutionOutcome {
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn resolved(url: String, feed: Option<String>) -> Self {
        Self {
            url: Some(url),
            feed,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.url.is_some()
    }
}

/// Identifies one of the search surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Single-result engine: first release link wins.
    Brave,
    /// List engine: candidates are scored.
    Mojeek,
    /// Ranked engine with an exclusion list and a direct-answer panel.
    Bing,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Brave, ProviderId::Mojeek, ProviderId::Bing];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Brave => "brave",
            ProviderId::Mojeek => "mojeek",
            ProviderId::Bing => "bing",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order in which providers are tried for one entity.
pub type FallbackOrder = [ProviderId; 3];

/// A candidate URL with its heuristic score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub score: u32,
    pub url: String,
}

/// Counts reported once a batch finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub with_feed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        let mut summary = Self::default();
        for entity in entities {
            summary.total += 1;
            if entity.url.is_some() {
                summary.resolved += 1;
            } else {
                summary.failed += 1;
            }
            if entity.feed.is_some() {
                summary.with_feed += 1;
            }
        }
        summary
    }
}
