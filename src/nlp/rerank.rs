use crate::types::ScoredCandidate;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("invalid repo path '{0}': expected exactly 'owner/repo'")]
    InvalidRepoPath(String),
}

/// `owner/repo` from the first two non-empty path segments of `url`.
pub fn extract_repo_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    Some(format!("{}/{}", owner, repo))
}

/// Additive, case-insensitive score of an `owner/repo` path against `keyword`:
///
/// | rule                 | points |
/// |----------------------|--------|
/// | repo == keyword      | 10     |
/// | owner == keyword     | 5      |
/// | keyword ⊆ repo       | 2      |
/// | keyword ⊆ owner      | 1      |
///
/// Anything that is not exactly two segments is a caller bug.
pub fn score_repo_path(repo_path: &str, keyword: &str) -> Result<u32, ScoreError> {
    let mut parts = repo_path.split('/');
    let (Some(owner), Some(repo), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ScoreError::InvalidRepoPath(repo_path.to_string()));
    };
    if owner.is_empty() || repo.is_empty() {
        return Err(ScoreError::InvalidRepoPath(repo_path.to_string()));
    }

    let keyword = keyword.to_lowercase();
    let owner = owner.to_lowercase();
    let repo = repo.to_lowercase();

    let mut score = 0;
    if repo == keyword {
        score += 10;
    }
    if owner == keyword {
        score += 5;
    }
    if repo.contains(&keyword) {
        score += 2;
    }
    if owner.contains(&keyword) {
        score += 1;
    }
    Ok(score)
}

/// Picks the candidate URL that best matches a keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlScorer {
    min_score: u32,
}

impl UrlScorer {
    /// Candidates scoring below `min_score` are never chosen.
    pub fn new(min_score: u32) -> Self {
        Self { min_score }
    }

    /// Score every URL that decomposes into `owner/repo`, in input order.
    /// URLs that do not decompose are skipped.
    pub fn rank(&self, urls: &[String], keyword: &str) -> Result<Vec<ScoredCandidate>, ScoreError> {
        let mut scored = Vec::with_capacity(urls.len());
        for url in urls {
            let Some(repo_path) = extract_repo_path(url) else {
                debug!("scorer: skipping '{}' (no owner/repo path)", url);
                continue;
            };
            let score = score_repo_path(&repo_path, keyword)?;
            if score < self.min_score {
                continue;
            }
            scored.push(ScoredCandidate {
                score,
                url: url.clone(),
            });
        }
        Ok(scored)
    }

    /// Highest-scoring URL; ties go to the earliest candidate.
    pub fn choose_best(&self, urls: &[String], keyword: &str) -> Result<Option<String>, ScoreError> {
        let mut best: Option<ScoredCandidate> = None;
        for candidate in self.rank(urls, keyword)? {
            if best.as_ref().is_none_or(|b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        Ok(best.map(|c| c.url))
    }
}

/// [`UrlScorer::choose_best`] with every decomposable candidate eligible.
pub fn choose_best_url(urls: &[String], keyword: &str) -> Result<Option<String>, ScoreError> {
    UrlScorer::default().choose_best(urls, keyword)
}
