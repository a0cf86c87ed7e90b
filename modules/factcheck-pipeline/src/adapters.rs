// Production implementations of the collaborator traits.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use ai_client::Ollama;
use factcheck_common::{Config, SearchResult};
use searxng_client::SearxngClient;

use crate::orchestrator::Orchestrator;
use crate::pipeline::scraper::is_text_content_type;
use crate::settings::PipelineSettings;
use crate::traits::{FetchedPage, PageFetcher, TextGenerator, WebSearcher};

/// Some sites refuse requests without a browser-looking User-Agent.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

// --- SearXNG ---

#[async_trait]
impl WebSearcher for SearxngClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let hits = SearxngClient::search(self, query)
            .await
            .context("SearXNG search failed")?;

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| SearchResult {
                title: hit.title,
                url: hit.url,
                rank,
            })
            .collect())
    }
}

// --- Plain HTTP fetcher ---

pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Bodies are read up to `max_body_bytes`; the rest is never downloaded.
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build scrape HTTP client")?;
        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

/// Collect a byte stream into text, stopping once `cap` bytes are held.
/// Invalid UTF-8, including a character cut at the cap, is replaced.
pub(crate) async fn read_capped<S, B, E>(stream: S, cap: usize) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stream = std::pin::pin!(stream);
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        let room = cap.saturating_sub(body.len());
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        // Skip downloading bodies the scraper would discard anyway.
        let wanted = resp.status().is_success() && is_text_content_type(content_type.as_deref());
        let body = if wanted {
            read_capped(resp.bytes_stream(), self.max_body_bytes).await?
        } else {
            String::new()
        };

        debug!(url, status, content_type = ?content_type, bytes = body.len(), "Fetched page");
        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

// --- Ollama ---

#[async_trait]
impl TextGenerator for Ollama {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(Ollama::generate(self, prompt).await?)
    }

    async fn generate_json(&self, prompt: &str, schema: serde_json::Value) -> Result<String> {
        Ok(Ollama::generate_json(self, prompt, schema).await?)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let stream = Ollama::generate_stream(self, prompt).await?;
        Ok(stream.map(|chunk| chunk.map_err(anyhow::Error::from)).boxed())
    }

    fn model(&self) -> &str {
        Ollama::model(self)
    }
}

// --- Wiring ---

/// Orchestrator backed by the configured SearXNG and Ollama instances.
pub fn orchestrator_from_config(config: &Config) -> Result<Orchestrator> {
    let searcher = SearxngClient::new(&config.searxng_url, config.search_timeout)
        .context("Failed to build SearXNG client")?
        .with_engines(&config.searxng_engines)
        .with_language(&config.searxng_language);
    let fetcher = HttpFetcher::new(config.scrape_timeout, config.max_page_bytes)?;
    let generator =
        Ollama::new(&config.ollama_url, &config.ollama_model).with_timeout(config.inference_timeout);

    info!(
        searxng = config.searxng_url.as_str(),
        ollama = generator.base_url(),
        model = generator.model(),
        inference_timeout_secs = generator.timeout().as_secs(),
        "Pipeline backends configured"
    );

    Ok(Orchestrator::new(
        Arc::new(searcher),
        Arc::new(fetcher),
        Arc::new(generator),
        PipelineSettings::from(config),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn chunks(parts: &[&str]) -> Vec<io::Result<Vec<u8>>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    #[test]
    fn ollama_reports_its_model_through_the_generator_trait() {
        let ollama = Ollama::new("http://localhost:11434", "llama3.2:1b");
        assert_eq!(TextGenerator::model(&ollama), "llama3.2:1b");
    }

    #[test]
    fn default_config_wires_an_orchestrator() {
        let config = Config::from_lookup(|_| None).unwrap();
        let orchestrator = orchestrator_from_config(&config).unwrap();
        assert_eq!(orchestrator.settings().max_candidates, config.max_candidates);
    }

    #[tokio::test]
    async fn body_under_the_cap_is_read_whole() {
        let body = read_capped(futures::stream::iter(chunks(&["<p>hello ", "world</p>"])), 1024)
            .await
            .unwrap();
        assert_eq!(body, "<p>hello world</p>");
    }

    #[tokio::test]
    async fn body_stops_at_the_cap() {
        let body = read_capped(futures::stream::iter(chunks(&["hello ", "world", "!!!"])), 8)
            .await
            .unwrap();
        assert_eq!(body, "hello wo");
    }

    #[tokio::test]
    async fn chunks_past_the_cap_are_never_polled() {
        let mut parts = chunks(&["abcdef"]);
        parts.push(Err(io::Error::other("connection reset")));
        let body = read_capped(futures::stream::iter(parts), 4).await.unwrap();
        assert_eq!(body, "abcd");
    }

    #[tokio::test]
    async fn split_character_at_the_cap_is_replaced() {
        let body = read_capped(futures::stream::iter(chunks(&["caf\u{e9}"])), 4)
            .await
            .unwrap();
        assert_eq!(body, "caf\u{fffd}");
    }
}
