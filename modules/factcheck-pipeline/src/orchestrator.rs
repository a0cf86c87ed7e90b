// Drives one fact-check from claim to verdict.
//
// Stages run strictly in order. Scraping, ranking and summarizing fan out
// per source, bounded by the requested source count. Every stage transition
// and every per-source resolution is a cancellation checkpoint: if the
// event receiver is gone, the run stops there.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use factcheck_common::{
    Claim, FactCheckError, PipelineEvent, RankedSource, SourceCard, SourceSummary, Verdict,
};

use crate::pipeline::search::rewrite_query;
use crate::pipeline::{select, RelevanceRanker, Scraper, SearchClient, Summarizer, Synthesizer};
use crate::settings::PipelineSettings;
use crate::sink::{event_channel, EventSink};
use crate::traits::{PageFetcher, TextGenerator, WebSearcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RewritingQuery,
    Searching,
    Scraping,
    Ranking,
    Selecting,
    Summarizing,
    Synthesizing,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::RewritingQuery => "rewrite",
            Stage::Searching => "search",
            Stage::Scraping => "scrape",
            Stage::Ranking => "rank",
            Stage::Selecting => "select",
            Stage::Summarizing => "summarize",
            Stage::Synthesizing => "synthesize",
        }
    }

    /// Text of the `{status}` event emitted on entering the stage.
    pub fn status_message(self) -> &'static str {
        match self {
            Stage::RewritingQuery => "Generating optimized search query...",
            Stage::Searching => "Searching for relevant sources...",
            Stage::Scraping => "Extracting content from sources...",
            Stage::Ranking => "Analyzing relevance of sources...",
            Stage::Selecting => "Selecting the most relevant sources...",
            Stage::Summarizing => "Summarizing relevant content...",
            Stage::Synthesizing => "Generating fact-check analysis...",
        }
    }
}

pub struct Orchestrator {
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn PageFetcher>,
    generator: Arc<dyn TextGenerator>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn PageFetcher>,
        generator: Arc<dyn TextGenerator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            searcher,
            fetcher,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Start a run on the runtime and hand back its event stream. Dropping
    /// the receiver cancels the run at its next checkpoint.
    pub fn spawn(self: &Arc<Self>, claim: Claim) -> mpsc::Receiver<PipelineEvent> {
        let (sink, rx) = event_channel(self.settings.event_buffer);
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let _ = orchestrator.run(&claim, &sink).await;
        });
        rx
    }

    /// Run the whole pipeline, pushing events into `sink`. Fatal failures
    /// are reported as a single `{error}` event and returned.
    pub async fn run(&self, claim: &Claim, sink: &EventSink) -> Result<Verdict, FactCheckError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "fact_check",
            %run_id,
            model = self.generator.model(),
            num_sources = claim.num_sources()
        );

        async move {
            info!(claim = claim.text(), "Starting fact check");
            let outcome = self.execute(claim, sink).await;
            match &outcome {
                Ok(verdict) => info!(sources = verdict.sources.len(), "Fact check complete"),
                Err(e) if !e.is_reportable() => info!("Caller went away, stopping fact check"),
                Err(e) => {
                    warn!(error = %e, "Fact check failed");
                    // The receiver may already be gone; nothing left to do then.
                    let _ = sink.emit(PipelineEvent::Error(e.to_string())).await;
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, claim: &Claim, sink: &EventSink) -> Result<Verdict, FactCheckError> {
        let settings = &self.settings;
        let k = claim.num_sources();

        // --- Search ---
        let query = if settings.rewrite_query {
            enter(sink, Stage::RewritingQuery).await?;
            rewrite_query(self.generator.as_ref(), claim.text(), settings.inference_timeout).await
        } else {
            claim.text().to_string()
        };

        enter(sink, Stage::Searching).await?;
        let candidates = SearchClient::new(self.searcher.clone(), settings)
            .search(&query, k)
            .await?;
        if candidates.is_empty() {
            return Err(FactCheckError::NoSources);
        }

        // --- Scrape ---
        enter(sink, Stage::Scraping).await?;
        let scraper = Scraper::new(self.fetcher.clone(), settings);
        let total = candidates.len();
        let mut scrapes = stream::iter(candidates)
            .map(|candidate| scraper.scrape(candidate))
            .buffer_unordered(k);

        let mut scraped = Vec::with_capacity(total);
        let mut done = 0;
        while let Some(source) = scrapes.next().await {
            done += 1;
            sink.status(format!("Scraped source {done} of {total}")).await?;
            if source.is_ok() {
                scraped.push(source);
            }
        }
        info!(ok = scraped.len(), failed = total - scraped.len(), "Scraping complete");
        if scraped.is_empty() {
            return Err(FactCheckError::NoSources);
        }

        // --- Rank ---
        enter(sink, Stage::Ranking).await?;
        let ranker = RelevanceRanker::new(self.generator.clone(), settings);
        let total = scraped.len();
        let mut rankings = stream::iter(scraped)
            .map(|source| ranker.rank(claim.text(), source))
            .buffer_unordered(k);

        let mut ranked = Vec::with_capacity(total);
        while let Some(source) = rankings.next().await {
            sink.status(format!(
                "Analyzed relevance of source {} of {total}",
                ranked.len() + 1
            ))
            .await?;
            ranked.push(source);
        }

        // --- Select ---
        enter(sink, Stage::Selecting).await?;
        let selected = select(ranked, k, settings.min_relevance_score);
        if selected.is_empty() {
            return Err(FactCheckError::NoSources);
        }
        for source in &selected {
            debug!(
                url = source.source.url.as_str(),
                score = source.relevance.score,
                rank = source.source.rank,
                "Selected source"
            );
        }

        // --- Summarize ---
        enter(sink, Stage::Summarizing).await?;
        let summarizer = Summarizer::new(self.generator.clone(), settings);
        let total = selected.len();
        let summaries_in_order: Vec<_> = selected
            .iter()
            .map(|source| summarizer.summarize(claim.text(), source))
            .collect();
        let mut pending = stream::iter(summaries_in_order).buffered(k);

        let mut summaries: Vec<SourceSummary> = Vec::with_capacity(total);
        while let Some(summary) = pending.next().await {
            sink.status(format!("Summarized source {} of {total}", summaries.len() + 1))
                .await?;
            summaries.push(summary);
        }

        // --- Synthesize ---
        enter(sink, Stage::Synthesizing).await?;
        let cards: Vec<SourceCard> = selected.iter().map(RankedSource::card).collect();
        let mut verdicts = Synthesizer::new(self.generator.clone(), settings)
            .synthesize(claim.text(), &summaries);

        let mut text = String::new();
        while let Some(partial) = verdicts.next().await {
            let first = text.is_empty();
            text = partial?;
            sink.emit(PipelineEvent::PartialResult {
                text: text.clone(),
                sources: first.then(|| cards.clone()),
            })
            .await?;
        }
        if text.is_empty() {
            return Err(FactCheckError::SynthesisFailure("empty response".into()));
        }

        sink.emit(PipelineEvent::Complete).await?;
        Ok(Verdict {
            text,
            sources: cards,
        })
    }
}

async fn enter(sink: &EventSink, stage: Stage) -> Result<(), FactCheckError> {
    sink.ensure_open()?;
    debug!(stage = stage.name(), "Entering stage");
    sink.status(stage.status_message()).await
}
