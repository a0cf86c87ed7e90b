use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tracing::{info, warn};

use factcheck_common::{FactCheckError, SourceSummary};

use crate::settings::PipelineSettings;
use crate::traits::TextGenerator;

const ATTEMPTS: usize = 2;

/// Produces the verdict from the claim and the ordered summaries.
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    streaming: bool,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: &PipelineSettings) -> Self {
        Self {
            generator,
            timeout: settings.inference_timeout,
            streaming: settings.stream_synthesis,
        }
    }

    /// Verdict text as it grows. Each item is the full text so far; in
    /// non-streaming mode there is exactly one item.
    ///
    /// A failed attempt is retried once, but only if nothing has been
    /// yielded yet. Once text has gone out, a failure ends the stream with
    /// `SynthesisFailure`.
    pub fn synthesize(
        &self,
        claim: &str,
        summaries: &[SourceSummary],
    ) -> BoxStream<'static, Result<String, FactCheckError>> {
        let prompt = synthesis_prompt(claim, summaries);
        let generator = self.generator.clone();
        let timeout = self.timeout;
        let streaming = self.streaming;

        Box::pin(async_stream::stream! {
            let mut reason = String::from("no attempt made");

            for attempt in 0..ATTEMPTS {
                if !streaming {
                    match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
                        Ok(Ok(text)) if !text.trim().is_empty() => {
                            info!(attempt, chars = text.len(), "Verdict generated");
                            yield Ok(text);
                            return;
                        }
                        Ok(Ok(_)) => reason = "empty response".to_string(),
                        Ok(Err(e)) => reason = format!("{e:#}"),
                        Err(_) => reason = format!("timed out after {}s", timeout.as_secs()),
                    }
                    warn!(stage = "synthesize", attempt, error = reason.as_str(), "Synthesis attempt failed");
                    continue;
                }

                let mut chunks = match tokio::time::timeout(timeout, generator.generate_stream(&prompt)).await {
                    Ok(Ok(chunks)) => chunks,
                    Ok(Err(e)) => {
                        reason = format!("{e:#}");
                        warn!(stage = "synthesize", attempt, error = reason.as_str(), "Synthesis stream failed to open");
                        continue;
                    }
                    Err(_) => {
                        reason = format!("timed out after {}s", timeout.as_secs());
                        warn!(stage = "synthesize", attempt, error = reason.as_str(), "Synthesis stream failed to open");
                        continue;
                    }
                };

                let mut text = String::new();
                let mut emitted = false;
                loop {
                    let failure = match tokio::time::timeout(timeout, chunks.next()).await {
                        Ok(Some(Ok(chunk))) => {
                            text.push_str(&chunk);
                            if !text.trim().is_empty() {
                                emitted = true;
                                yield Ok(text.clone());
                            }
                            continue;
                        }
                        Ok(None) if emitted => {
                            info!(attempt, chars = text.len(), "Verdict streamed");
                            return;
                        }
                        Ok(None) => "empty response".to_string(),
                        Ok(Some(Err(e))) => format!("{e:#}"),
                        Err(_) => format!("stream stalled for {}s", timeout.as_secs()),
                    };

                    warn!(stage = "synthesize", attempt, emitted, error = failure.as_str(), "Synthesis stream failed");
                    if emitted {
                        yield Err(FactCheckError::SynthesisFailure(failure));
                        return;
                    }
                    reason = failure;
                    break;
                }
            }

            yield Err(FactCheckError::SynthesisFailure(reason));
        })
    }
}

pub fn synthesis_prompt(claim: &str, summaries: &[SourceSummary]) -> String {
    let mut sources = String::new();
    for (i, summary) in summaries.iter().enumerate() {
        if i > 0 {
            sources.push_str("\n\n");
        }
        let _ = write!(
            sources,
            "[Source {}] {} ({})\n{}",
            i + 1,
            summary.title,
            summary.url,
            summary.relevant_excerpt
        );
    }

    format!(
        r#"Fact check the following claim using the provided sources at the end of this prompt:

<claim>
{claim}
</claim>

Reiterate the claim and expand its assumptions, briefly.
Provide a detailed analysis of the claim's veracity, citing specific information from the sources.
DO NOT refer to any information not present in the sources.
Format your response in markdown with clear sections:

1. Verdict (True/False/Partially True/Unverified)
2. One sentence reiteration of the claim (removing political or charged language)
3. Explanation
4. Key Evidence

<sources>
{sources}
</sources>"#
    )
}
