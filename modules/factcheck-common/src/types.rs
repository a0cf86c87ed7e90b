use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SourceLimits;
use crate::error::FactCheckError;

// --- Claim ---

/// A validated claim plus the number of sources the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    text: String,
    num_sources: usize,
}

impl Claim {
    /// Validate raw request input. `num_sources` falls back to the configured
    /// default when absent.
    pub fn parse(
        text: &str,
        num_sources: Option<i64>,
        limits: &SourceLimits,
    ) -> Result<Self, FactCheckError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FactCheckError::Validation("No claim provided".into()));
        }

        let requested = num_sources.unwrap_or(limits.default as i64);
        if requested < limits.min as i64 || requested > limits.max as i64 {
            return Err(FactCheckError::Validation(format!(
                "Invalid number of sources: {requested} (must be between {} and {})",
                limits.min, limits.max
            )));
        }

        Ok(Self {
            text: text.to_string(),
            num_sources: requested as usize,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn num_sources(&self) -> usize {
        self.num_sources
    }
}

// --- Search ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Zero-based position in the search backend's ordering.
    pub rank: usize,
}

// --- Scrape ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStatus {
    Ok,
    Timeout,
    HttpError,
    NonText,
    Empty,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchStatus::Ok => "ok",
            FetchStatus::Timeout => "timeout",
            FetchStatus::HttpError => "http-error",
            FetchStatus::NonText => "non-text",
            FetchStatus::Empty => "empty",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedSource {
    pub source: SearchResult,
    pub raw_text: String,
    pub fetch_status: FetchStatus,
}

impl ScrapedSource {
    pub fn ok(source: SearchResult, raw_text: String) -> Self {
        Self {
            source,
            raw_text,
            fetch_status: FetchStatus::Ok,
        }
    }

    pub fn failed(source: SearchResult, fetch_status: FetchStatus) -> Self {
        Self {
            source,
            raw_text: String::new(),
            fetch_status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.fetch_status == FetchStatus::Ok
    }
}

// --- Rank ---

/// Relevance judgment on the 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    pub score: f64,
    pub explanation: String,
}

pub const MIN_RELEVANCE: f64 = 0.0;
pub const MAX_RELEVANCE: f64 = 10.0;

impl Relevance {
    /// Clamps the score into the 0-10 scale; NaN becomes 0.
    pub fn new(score: f64, explanation: impl Into<String>) -> Self {
        let score = if score.is_nan() {
            MIN_RELEVANCE
        } else {
            score.clamp(MIN_RELEVANCE, MAX_RELEVANCE)
        };
        Self {
            score,
            explanation: explanation.into(),
        }
    }

    pub fn unscored(explanation: impl Into<String>) -> Self {
        Self::new(MIN_RELEVANCE, explanation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedSource {
    pub source: SearchResult,
    pub raw_text: String,
    pub relevance: Relevance,
}

impl RankedSource {
    pub fn card(&self) -> SourceCard {
        SourceCard {
            title: self.source.title.clone(),
            url: self.source.url.clone(),
            relevance: self.relevance.clone(),
        }
    }
}

/// Source metadata as shown to the caller in the `sources` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCard {
    pub title: String,
    pub url: String,
    pub relevance: Relevance,
}

// --- Summarize ---

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub url: String,
    pub title: String,
    pub relevant_excerpt: String,
    /// True when the excerpt is a raw-text prefix rather than a model summary.
    pub is_fallback: bool,
}

// --- Verdict ---

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub text: String,
    pub sources: Vec<SourceCard>,
}
