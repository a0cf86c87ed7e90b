use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use ai_client::truncate_chars;
use factcheck_common::{RankedSource, SourceSummary};

use super::decode::Decoded;
use crate::settings::PipelineSettings;
use crate::traits::TextGenerator;

/// Extracts the claim-relevant part of each selected source. Never drops a
/// source: when the model can't deliver, a raw-text prefix stands in.
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    fallback_chars: usize,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: &PipelineSettings) -> Self {
        Self {
            generator,
            timeout: settings.inference_timeout,
            fallback_chars: settings.summary_fallback_chars,
        }
    }

    pub async fn summarize(&self, claim: &str, selected: &RankedSource) -> SourceSummary {
        let url = selected.source.url.as_str();
        let prompts = [
            summary_prompt(claim, &selected.raw_text),
            strict_summary_prompt(claim, &selected.raw_text),
        ];

        for (attempt, prompt) in prompts.iter().enumerate() {
            let reason = match tokio::time::timeout(self.timeout, self.generator.generate(prompt)).await {
                Ok(Ok(raw)) => match decode_summary(&raw) {
                    Decoded::Parsed(excerpt) => {
                        debug!(url, attempt, chars = excerpt.len(), "Summarized source");
                        return SourceSummary {
                            url: selected.source.url.clone(),
                            title: selected.source.title.clone(),
                            relevant_excerpt: excerpt,
                            is_fallback: false,
                        };
                    }
                    Decoded::Malformed(why) => why,
                },
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => format!("timed out after {}s", self.timeout.as_secs()),
            };
            warn!(url, stage = "summarize", attempt, error = reason.as_str(), "Summary attempt failed");
        }

        warn!(url, stage = "summarize", chars = self.fallback_chars, "Falling back to raw text");
        SourceSummary {
            url: selected.source.url.clone(),
            title: selected.source.title.clone(),
            relevant_excerpt: truncate_chars(&selected.raw_text, self.fallback_chars).to_string(),
            is_fallback: true,
        }
    }
}

pub fn summary_prompt(claim: &str, content: &str) -> String {
    format!(
        r#"Extract the portions of the following webpage content that are relevant to fact-checking this claim:

<claim>
{claim}
</claim>

<content>
{content}
</content>

Remove any advertisements, navigation elements, or irrelevant content.
Provide a detailed summary that:
1. Preserves specific facts, figures, and quotes
2. Maintains chronological order of events if present
3. Keeps source attributions and citations
4. Removes boilerplate website content
5. Eliminates redundant information

Format the summary in clear paragraphs."#
    )
}

fn strict_summary_prompt(claim: &str, content: &str) -> String {
    format!(
        "{}\n\nYour previous answer was empty or unusable. Reply with the relevant excerpt \
         as plain prose only. Do not apologize and do not describe errors.",
        summary_prompt(claim, content)
    )
}

/// Model output is usable as a summary unless it is blank or an error marker.
pub fn decode_summary(raw: &str) -> Decoded<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Decoded::malformed("empty summary");
    }
    if text.starts_with("Error:") {
        return Decoded::malformed(format!("error marker: {}", truncate_chars(text, 80)));
    }
    Decoded::Parsed(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGenerator, MockReply};
    use factcheck_common::{Relevance, SearchResult};

    const CLAIM: &str = "The Eiffel Tower is in Berlin";

    fn selected(raw_text: &str) -> RankedSource {
        RankedSource {
            source: SearchResult {
                title: "Eiffel Tower".into(),
                url: "https://example.org/eiffel".into(),
                rank: 0,
            },
            raw_text: raw_text.into(),
            relevance: Relevance::new(9.0, "relevant"),
        }
    }

    fn summarizer(generator: Arc<MockGenerator>, fallback_chars: usize) -> Summarizer {
        let settings = PipelineSettings::builder()
            .inference_timeout(Duration::from_millis(100))
            .summary_fallback_chars(fallback_chars)
            .build();
        Summarizer::new(generator, &settings)
    }

    #[test]
    fn decode_rejects_blank_and_error_markers() {
        assert!(!decode_summary("  \n ").is_parsed());
        assert!(!decode_summary("Error: model overloaded").is_parsed());
        assert_eq!(
            decode_summary("  The tower is in Paris.  "),
            Decoded::Parsed("The tower is in Paris.".to_string())
        );
    }

    #[tokio::test]
    async fn returns_model_summary() {
        let generator = Arc::new(MockGenerator::new().on_text("detailed summary", "Located in Paris since 1889."));
        let summary = summarizer(generator, 8000).summarize(CLAIM, &selected("long page text")).await;

        assert_eq!(summary.relevant_excerpt, "Located in Paris since 1889.");
        assert_eq!(summary.url, "https://example.org/eiffel");
        assert_eq!(summary.title, "Eiffel Tower");
        assert!(!summary.is_fallback);
    }

    #[tokio::test]
    async fn retries_after_empty_output() {
        let generator = Arc::new(
            MockGenerator::new()
                .on_text("detailed summary", "")
                .on_text("detailed summary", "Paris."),
        );
        let summary = summarizer(generator.clone(), 8000).summarize(CLAIM, &selected("text")).await;

        assert_eq!(summary.relevant_excerpt, "Paris.");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_truncated_raw_text() {
        let generator = Arc::new(MockGenerator::new().on("detailed summary", MockReply::fail("connection reset")));
        let summary = summarizer(generator.clone(), 5).summarize(CLAIM, &selected("Paris, France")).await;

        assert!(summary.is_fallback);
        assert_eq!(summary.relevant_excerpt, "Paris");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn timeouts_fall_back_too() {
        let generator = Arc::new(MockGenerator::new().on("detailed summary", MockReply::Hang));
        let summary = summarizer(generator, 8000).summarize(CLAIM, &selected("raw")).await;

        assert!(summary.is_fallback);
        assert_eq!(summary.relevant_excerpt, "raw");
    }
}
