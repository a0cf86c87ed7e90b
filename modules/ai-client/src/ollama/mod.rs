mod client;
pub(crate) mod types;

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;

use crate::error::Result;
use client::OllamaClient;
use types::GenerateRequest;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Incremental text chunks from a streaming generation.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// =============================================================================
// Ollama
// =============================================================================

#[derive(Clone)]
pub struct Ollama {
    http: reqwest::Client,
    base_url: String,
    pub(crate) model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl Ollama {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            temperature: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client(&self) -> OllamaClient {
        OllamaClient::new(self.http.clone(), &self.base_url)
    }

    fn request(&self, prompt: impl Into<String>) -> GenerateRequest {
        GenerateRequest::new(&self.model, prompt).temperature(self.temperature)
    }

    /// Plain text completion.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.client()
            .generate(&self.request(prompt), self.timeout)
            .await
    }

    /// Completion constrained by a JSON schema passed as Ollama's `format`.
    /// Returns the raw text, which may still not match the schema.
    pub async fn generate_json(&self, prompt: &str, schema: serde_json::Value) -> Result<String> {
        self.client()
            .generate(&self.request(prompt).format(schema), self.timeout)
            .await
    }

    /// Token-by-token completion. The configured timeout bounds the wait for
    /// each chunk rather than the whole generation.
    pub async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        self.client()
            .generate_stream(&self.request(prompt).streaming(), self.timeout)
            .await
    }
}

impl std::fmt::Debug for Ollama {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ollama")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AiError;

    #[test]
    fn test_ollama_new() {
        let ai = Ollama::new("http://ollama:11434", "llama3.2:1b");
        assert_eq!(ai.model(), "llama3.2:1b");
        assert_eq!(ai.base_url(), "http://ollama:11434");
        assert_eq!(ai.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_ollama_builders() {
        let ai = Ollama::new("http://localhost:11434", "mistral")
            .with_temperature(0.1)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(ai.temperature, Some(0.1));
        assert_eq!(ai.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_request_uses_configured_model() {
        let ai = Ollama::new("http://localhost:11434", "mistral").with_temperature(0.0);
        let req = ai.request("prompt");
        assert_eq!(req.model, "mistral");
        assert!(!req.stream);
        assert!(req.options.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) on localhost is not an HTTP server.
        let ai = Ollama::new("http://127.0.0.1:9", "mistral")
            .with_timeout(Duration::from_secs(2));
        let err = ai.generate("hello").await.unwrap_err();
        assert!(
            matches!(err, AiError::Network(_) | AiError::Timeout(_)),
            "unexpected error: {err}"
        );
    }
}
