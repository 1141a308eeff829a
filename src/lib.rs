pub mod core;
pub mod features;
pub mod nlp;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::config;
pub use core::types;
pub use core::types::*;
pub use core::ResolverConfig;

// --- Short module paths ---
pub use features::antibot;
pub use nlp::rerank;
pub use tools::{feed, redirect, resolve, search};

pub use features::CaptchaGuard;
pub use nlp::{choose_best_url, UrlScorer};
pub use scraping::{BrowserError, BrowserSession, PageDriver, PageSource};
pub use tools::{
    load_entities, run_with_browser, save_json, FeedExtractor, RedirectResolver,
    ResolutionOrchestrator,
};
