use std::time::Duration;

use typed_builder::TypedBuilder;

use factcheck_common::Config;

/// Tunables for one pipeline run. Derived from [`Config`] in production;
/// tests build it directly and override only what they exercise.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PipelineSettings {
    #[builder(default = 20)]
    pub max_candidates: usize,
    #[builder(default = 2)]
    pub candidate_multiplier: usize,
    #[builder(default = Duration::from_secs(15))]
    pub search_timeout: Duration,
    #[builder(default = Duration::from_secs(10))]
    pub scrape_timeout: Duration,
    #[builder(default = Duration::from_secs(120))]
    pub inference_timeout: Duration,
    #[builder(default = 12_000)]
    pub max_source_chars: usize,
    #[builder(default = 8_000)]
    pub summary_fallback_chars: usize,
    #[builder(default = 0.0)]
    pub min_relevance_score: f64,
    #[builder(default = true)]
    pub stream_synthesis: bool,
    #[builder(default = true)]
    pub rewrite_query: bool,
    /// Capacity of the event channel handed to callers.
    #[builder(default = 64)]
    pub event_buffer: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self::builder()
            .max_candidates(config.max_candidates)
            .candidate_multiplier(config.candidate_multiplier)
            .search_timeout(config.search_timeout)
            .scrape_timeout(config.scrape_timeout)
            .inference_timeout(config.inference_timeout)
            .max_source_chars(config.max_source_chars)
            .summary_fallback_chars(config.summary_fallback_chars)
            .min_relevance_score(config.min_relevance_score)
            .stream_synthesis(config.stream_synthesis)
            .rewrite_query(config.rewrite_query)
            .build()
    }
}
