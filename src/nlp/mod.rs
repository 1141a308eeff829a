pub mod rerank;

pub use rerank::{choose_best_url, ScoreError, UrlScorer};
