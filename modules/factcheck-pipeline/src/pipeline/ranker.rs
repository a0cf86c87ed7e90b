use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use ai_client::{extract_json_object, strip_code_blocks, StructuredOutput};
use factcheck_common::{RankedSource, Relevance, ScrapedSource};

use super::decode::Decoded;
use crate::settings::PipelineSettings;
use crate::traits::TextGenerator;

/// Shape the model is asked to return. Only used for the schema handed to
/// the backend; decoding is lenient and goes through [`decode_relevance`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RelevancePayload {
    /// Relevance to the claim, 0 (unrelated) to 10 (directly addresses it).
    pub score: f64,
    /// One or two sentences justifying the score.
    pub explanation: String,
}

/// Scores each scraped source against the claim. Never fails: anything that
/// goes wrong yields score 0 with an explanation.
pub struct RelevanceRanker {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl RelevanceRanker {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: &PipelineSettings) -> Self {
        Self {
            generator,
            timeout: settings.inference_timeout,
        }
    }

    pub async fn rank(&self, claim: &str, scraped: ScrapedSource) -> RankedSource {
        let relevance = self.judge(claim, &scraped).await;
        debug!(url = scraped.source.url.as_str(), score = relevance.score, "Ranked source");
        RankedSource {
            source: scraped.source,
            raw_text: scraped.raw_text,
            relevance,
        }
    }

    async fn judge(&self, claim: &str, scraped: &ScrapedSource) -> Relevance {
        let url = scraped.source.url.as_str();
        let schema = RelevancePayload::ollama_format();
        let prompts = [
            relevance_prompt(claim, &scraped.raw_text),
            strict_relevance_prompt(claim, &scraped.raw_text),
        ];

        let mut reason = String::new();
        for (attempt, prompt) in prompts.iter().enumerate() {
            let call = self.generator.generate_json(prompt, schema.clone());
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(raw)) => match decode_relevance(&raw) {
                    Decoded::Parsed(relevance) => return relevance,
                    Decoded::Malformed(why) => {
                        warn!(url, stage = "rank", attempt, error = why.as_str(), "Malformed relevance output");
                        reason = why;
                    }
                },
                Ok(Err(e)) => {
                    warn!(url, stage = "rank", error = %e, "Relevance call failed");
                    return Relevance::unscored(format!("Error in relevance analysis: {e}"));
                }
                Err(_) => {
                    warn!(url, stage = "rank", error = "timeout", "Relevance call timed out");
                    return Relevance::unscored(format!(
                        "Error in relevance analysis: timed out after {}s",
                        self.timeout.as_secs()
                    ));
                }
            }
        }

        Relevance::unscored(format!("Error parsing relevance analysis: {reason}"))
    }
}

pub fn relevance_prompt(claim: &str, content: &str) -> String {
    format!(
        r#"Analyze how relevant the following content is to fact-checking this claim:

<claim>
{claim}
</claim>

<content>
{content}
</content>

Rate relevance from 0-10 and explain why. Provide response in PROPER JSON format:
{{
    "score": <0-10>,
    "explanation": "<explanation>"
}}
If any error is present in the text, the score should be ZERO.
Make sure all JSON is valid."#
    )
}

fn strict_relevance_prompt(claim: &str, content: &str) -> String {
    format!(
        "{}\n\nYour previous answer could not be parsed. Respond with ONLY a single JSON object \
         with a numeric \"score\" between 0 and 10 and a string \"explanation\". \
         No markdown, no code fences, no text before or after the object.",
        relevance_prompt(claim, content)
    )
}

/// Interpret model output as a relevance judgment. Tolerates code fences,
/// surrounding prose, and a score given as a numeric string.
pub fn decode_relevance(raw: &str) -> Decoded<Relevance> {
    let Some(json) = extract_json_object(strip_code_blocks(raw)) else {
        return Decoded::malformed("no JSON object in response");
    };
    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => return Decoded::malformed(format!("invalid JSON: {e}")),
    };

    let score = match value.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(score) = score.filter(|s| s.is_finite()) else {
        return Decoded::malformed("score is missing or not numeric");
    };
    let Some(explanation) = value.get("explanation").and_then(Value::as_str) else {
        return Decoded::malformed("explanation is missing or not a string");
    };

    Decoded::Parsed(Relevance::new(score, explanation))
}
