use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::FactCheckError;
use crate::types::{MAX_RELEVANCE, MIN_RELEVANCE};

/// Bounds on the `num_sources` a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLimits {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Search backend
    pub searxng_url: String,
    pub searxng_engines: String,
    pub searxng_language: String,

    // Inference backend
    pub ollama_url: String,
    pub ollama_model: String,

    // Web server
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // Pipeline
    pub source_limits: SourceLimits,
    pub max_candidates: usize,
    pub candidate_multiplier: usize,
    pub search_timeout: Duration,
    pub scrape_timeout: Duration,
    pub inference_timeout: Duration,
    pub max_source_chars: usize,
    pub max_page_bytes: usize,
    pub summary_fallback_chars: usize,
    pub min_relevance_score: f64,
    pub stream_synthesis: bool,
    pub rewrite_query: bool,
}

impl Config {
    /// Load `.env` (if present) and read configuration from the process environment.
    pub fn from_env() -> Result<Self, FactCheckError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FactCheckError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let source_limits = SourceLimits {
            min: parse(&lookup, "MIN_SOURCES", 1)?,
            max: parse(&lookup, "MAX_SOURCES", 10)?,
            default: parse(&lookup, "DEFAULT_SOURCES", 3)?,
        };
        if source_limits.min == 0
            || source_limits.min > source_limits.max
            || !(source_limits.min..=source_limits.max).contains(&source_limits.default)
        {
            return Err(FactCheckError::Config(format!(
                "source limits must satisfy 1 <= MIN_SOURCES <= DEFAULT_SOURCES <= MAX_SOURCES, got {source_limits:?}"
            )));
        }

        let max_candidates: usize = parse(&lookup, "MAX_CANDIDATES", 20)?;
        if max_candidates < source_limits.max {
            return Err(FactCheckError::Config(format!(
                "MAX_CANDIDATES ({max_candidates}) must be at least MAX_SOURCES ({})",
                source_limits.max
            )));
        }

        let min_relevance_score: f64 = parse(&lookup, "MIN_RELEVANCE_SCORE", MIN_RELEVANCE)?;
        if !(MIN_RELEVANCE..=MAX_RELEVANCE).contains(&min_relevance_score) {
            return Err(FactCheckError::Config(format!(
                "MIN_RELEVANCE_SCORE must be between {MIN_RELEVANCE} and {MAX_RELEVANCE}, got {min_relevance_score}"
            )));
        }

        let max_page_bytes: usize = parse(&lookup, "MAX_PAGE_BYTES", 2_000_000)?;
        if max_page_bytes == 0 {
            return Err(FactCheckError::Config("MAX_PAGE_BYTES must be positive".into()));
        }

        Ok(Self {
            searxng_url: string("SEARXNG_URL", "http://localhost:8080"),
            searxng_engines: string("SEARXNG_ENGINES", "google,bing"),
            searxng_language: string("SEARXNG_LANGUAGE", "en"),
            ollama_url: string("OLLAMA_URL", "http://localhost:11434"),
            ollama_model: string("OLLAMA_MODEL", "llama3.2:1b"),
            host: string("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 5000)?,
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            source_limits,
            max_candidates,
            candidate_multiplier: parse(&lookup, "CANDIDATE_MULTIPLIER", 2)?,
            search_timeout: Duration::from_secs(parse(&lookup, "SEARCH_TIMEOUT_SECS", 15)?),
            scrape_timeout: Duration::from_secs(parse(&lookup, "SCRAPE_TIMEOUT_SECS", 10)?),
            inference_timeout: Duration::from_secs(parse(&lookup, "INFERENCE_TIMEOUT_SECS", 120)?),
            max_source_chars: parse(&lookup, "MAX_SOURCE_CHARS", 12_000)?,
            max_page_bytes,
            summary_fallback_chars: parse(&lookup, "SUMMARY_FALLBACK_CHARS", 8_000)?,
            min_relevance_score,
            stream_synthesis: parse_bool(&lookup, "STREAM_SYNTHESIS", true)?,
            rewrite_query: parse_bool(&lookup, "REWRITE_QUERY", true)?,
        })
    }
}

impl Config {
    /// Log the effective settings at startup.
    pub fn log_summary(&self) {
        info!(
            searxng_url = self.searxng_url.as_str(),
            searxng_engines = self.searxng_engines.as_str(),
            ollama_url = self.ollama_url.as_str(),
            ollama_model = self.ollama_model.as_str(),
            min_sources = self.source_limits.min,
            max_sources = self.source_limits.max,
            default_sources = self.source_limits.default,
            max_candidates = self.max_candidates,
            max_page_bytes = self.max_page_bytes,
            stream_synthesis = self.stream_synthesis,
            rewrite_query = self.rewrite_query,
            "Configuration loaded"
        );
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T, FactCheckError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| FactCheckError::Config(format!("{key}={raw:?}: {e}"))),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, FactCheckError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(FactCheckError::Config(format!(
                "{key}={v:?}: expected true or false"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, FactCheckError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_local_development_setup() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.searxng_url, "http://localhost:8080");
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.ollama_model, "llama3.2:1b");
        assert_eq!(config.port, 5000);
        assert_eq!(
            config.source_limits,
            SourceLimits {
                min: 1,
                max: 10,
                default: 3
            }
        );
        assert_eq!(config.max_source_chars, 12_000);
        assert_eq!(config.scrape_timeout, Duration::from_secs(10));
        assert!(config.stream_synthesis);
        assert!(config.rewrite_query);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("OLLAMA_MODEL", "mistral"),
            ("MAX_SOURCES", "5"),
            ("STREAM_SYNTHESIS", "false"),
            ("MIN_RELEVANCE_SCORE", "2.5"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();
        assert_eq!(config.ollama_model, "mistral");
        assert_eq!(config.source_limits.max, 5);
        assert!(!config.stream_synthesis);
        assert_eq!(config.min_relevance_score, 2.5);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn unparseable_values_are_config_errors() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, FactCheckError::Config(ref m) if m.contains("PORT")));

        let err = config_from(&[("REWRITE_QUERY", "maybe")]).unwrap_err();
        assert!(matches!(err, FactCheckError::Config(_)));
    }

    #[test]
    fn inconsistent_source_limits_are_rejected() {
        assert!(config_from(&[("MIN_SOURCES", "0")]).is_err());
        assert!(config_from(&[("MIN_SOURCES", "4"), ("DEFAULT_SOURCES", "3")]).is_err());
        assert!(config_from(&[("MAX_SOURCES", "30")]).is_err());
    }

    #[test]
    fn minimum_relevance_must_be_on_the_score_scale() {
        for raw in ["NaN", "-1", "10.5", "inf"] {
            let err = config_from(&[("MIN_RELEVANCE_SCORE", raw)]).unwrap_err();
            assert!(
                matches!(err, FactCheckError::Config(ref m) if m.contains("MIN_RELEVANCE_SCORE")),
                "{raw}"
            );
        }
        assert_eq!(config_from(&[("MIN_RELEVANCE_SCORE", "10")]).unwrap().min_relevance_score, 10.0);
    }

    #[test]
    fn page_byte_cap_must_be_positive() {
        assert_eq!(config_from(&[]).unwrap().max_page_bytes, 2_000_000);
        assert!(config_from(&[("MAX_PAGE_BYTES", "0")]).is_err());
    }
}
