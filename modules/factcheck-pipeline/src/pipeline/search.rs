use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use factcheck_common::{FactCheckError, SearchResult};

use crate::settings::PipelineSettings;
use crate::traits::{TextGenerator, WebSearcher};

/// Turns a query into a bounded, de-duplicated list of candidate links.
pub struct SearchClient {
    searcher: Arc<dyn WebSearcher>,
    timeout: Duration,
    candidate_multiplier: usize,
    max_candidates: usize,
}

impl SearchClient {
    pub fn new(searcher: Arc<dyn WebSearcher>, settings: &PipelineSettings) -> Self {
        Self {
            searcher,
            timeout: settings.search_timeout,
            candidate_multiplier: settings.candidate_multiplier,
            max_candidates: settings.max_candidates,
        }
    }

    /// Search for candidates for `requested` sources. Any backend failure is
    /// fatal for the run.
    pub async fn search(
        &self,
        query: &str,
        requested: usize,
    ) -> Result<Vec<SearchResult>, FactCheckError> {
        let results = match tokio::time::timeout(self.timeout, self.searcher.search(query)).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => return Err(FactCheckError::SearchUnavailable(format!("{e:#}"))),
            Err(_) => {
                return Err(FactCheckError::SearchUnavailable(format!(
                    "search timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        let total = results.len();
        let limit = candidate_limit(requested, self.candidate_multiplier, self.max_candidates);
        let candidates: Vec<SearchResult> = dedupe(results).into_iter().take(limit).collect();

        info!(query, total, kept = candidates.len(), limit, "Search complete");
        Ok(candidates)
    }
}

/// How many candidates to scrape for `requested` sources. Never below
/// `requested`, so a small cap cannot starve the selection.
pub fn candidate_limit(requested: usize, multiplier: usize, cap: usize) -> usize {
    requested
        .saturating_mul(multiplier)
        .max(requested)
        .min(cap.max(requested))
}

/// Canonical form used to spot duplicate links. `None` for anything that
/// isn't an http(s) URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    if path.len() < url.path().len() {
        url.set_path(&path);
    }
    Some(url.to_string())
}

/// Drop non-http(s) results and later duplicates, keeping backend order.
fn dedupe(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter_map(|mut result| {
            let key = normalize_url(&result.url)?;
            if !seen.insert(key) {
                return None;
            }
            result.url = result.url.trim().to_string();
            Some(result)
        })
        .collect()
}

// --- Query rewrite ---

pub fn rewrite_prompt(claim: &str) -> String {
    format!(
        r#"Convert the following fact-checking request into a clear, focused search query.
Focus on the key elements that need verification.
Search query must be six words or fewer. Follow the example, "Evidence for/against <claim>".

Request: {claim}

Provide only the search query, nothing else."#
    )
}

/// Ask the model for a tighter search query. Falls back to the claim itself
/// when the backend fails or returns nothing usable.
pub async fn rewrite_query(generator: &dyn TextGenerator, claim: &str, timeout: Duration) -> String {
    let prompt = rewrite_prompt(claim);
    match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
        Ok(Ok(raw)) => match clean_query(&raw) {
            Some(query) => {
                info!(query = %query, "Rewrote claim into search query");
                query
            }
            None => {
                warn!(stage = "rewrite", "Empty search query from model, using claim");
                claim.to_string()
            }
        },
        Ok(Err(e)) => {
            warn!(stage = "rewrite", error = %e, "Query rewrite failed, using claim");
            claim.to_string()
        }
        Err(_) => {
            warn!(stage = "rewrite", "Query rewrite timed out, using claim");
            claim.to_string()
        }
    }
}

/// First non-blank line, without wrapping quotes or a leading label.
fn clean_query(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .strip_prefix("Search query:")
        .map(str::trim)
        .unwrap_or(line);
    let line = line.trim_matches(|c| matches!(c, '"' | '\'' | '`')).trim();
    (!line.is_empty()).then(|| line.to_string())
}
