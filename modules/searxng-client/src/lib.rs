pub mod error;

pub use error::{Result, SearxngError};

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

const DEFAULT_ENGINES: &str = "google,bing";
const DEFAULT_LANGUAGE: &str = "en";

/// One organic result as SearXNG reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub engine: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Option<Vec<SearchHit>>,
}

pub struct SearxngClient {
    client: reqwest::Client,
    base_url: String,
    engines: String,
    language: String,
}

impl SearxngClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            engines: DEFAULT_ENGINES.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Comma-separated engine list passed through to SearXNG.
    pub fn with_engines(mut self, engines: &str) -> Self {
        self.engines = engines.to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a query against `/search?format=json`. Results keep the backend's
    /// ranking order.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let endpoint = format!("{}/search", self.base_url);
        debug!(query, engines = %self.engines, "SearXNG search");

        let resp = self
            .client
            .get(&endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("engines", self.engines.as_str()),
                ("language", self.language.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SearxngError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        parse_response(&body)
    }
}

/// Decode a SearXNG JSON body. A body without a `results` field is malformed;
/// an empty `results` array is a valid empty answer.
pub fn parse_response(body: &str) -> Result<Vec<SearchHit>> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| SearxngError::Malformed(e.to_string()))?;
    parsed
        .results
        .ok_or_else(|| SearxngError::Malformed("No results field in SearXNG response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_in_backend_order() {
        let body = r#"{
            "query": "eiffel tower location",
            "results": [
                {"url": "https://a.example/eiffel", "title": "Eiffel Tower", "content": "Paris", "engine": "google"},
                {"url": "https://b.example/berlin", "title": "Berlin sights"}
            ]
        }"#;
        let hits = parse_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.example/eiffel");
        assert_eq!(hits[0].engine.as_deref(), Some("google"));
        assert_eq!(hits[1].title, "Berlin sights");
        assert!(hits[1].content.is_empty());
    }

    #[test]
    fn missing_results_field_is_malformed() {
        let err = parse_response(r#"{"query": "x"}"#).unwrap_err();
        assert!(matches!(err, SearxngError::Malformed(_)));
    }

    #[test]
    fn empty_results_are_valid() {
        assert!(parse_response(r#"{"results": []}"#).unwrap().is_empty());
    }

    #[test]
    fn html_error_page_is_malformed() {
        let err = parse_response("<html>Too Many Requests</html>").unwrap_err();
        assert!(matches!(err, SearxngError::Malformed(_)));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = SearxngClient::with_client("http://searx:8080/", reqwest::Client::new())
            .with_engines("duckduckgo")
            .with_language("fr");
        assert_eq!(client.base_url(), "http://searx:8080");
        assert_eq!(client.engines, "duckduckgo");
        assert_eq!(client.language, "fr");
    }
}
