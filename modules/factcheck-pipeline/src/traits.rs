// Trait abstractions for the pipeline's external collaborators.
//
// WebSearcher wraps the search backend, PageFetcher the raw HTTP fetch,
// TextGenerator the inference backend. Production implementations live in
// `adapters`; `testing` has HashMap-backed mocks so the whole pipeline runs
// without network access.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use factcheck_common::SearchResult;

// --- WebSearcher ---

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Candidate links in backend rank order. `rank` is the 0-based position.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

// --- PageFetcher ---

/// Raw HTTP response for a candidate page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL. Non-success statuses are returned as pages, not errors;
    /// `Err` means the request never completed.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
    fn name(&self) -> &str;
}

// --- TextGenerator ---

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generation constrained to a JSON schema where the backend supports it.
    async fn generate_json(&self, prompt: &str, _schema: serde_json::Value) -> Result<String> {
        self.generate(prompt).await
    }

    /// Incremental generation. Backends without streaming yield the whole
    /// response as a single chunk.
    async fn generate_stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let text = self.generate(prompt).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }

    fn model(&self) -> &str;
}
