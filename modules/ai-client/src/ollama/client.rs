use std::time::Duration;

use futures::StreamExt;
use tracing::debug;

use super::types::*;
use super::TextStream;
use crate::error::{AiError, Result};

pub(crate) struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    async fn send(&self, request: &GenerateRequest, timeout: Duration) -> Result<reqwest::Response> {
        let send = self
            .http
            .post(self.generate_url())
            .json(request)
            .send();

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| AiError::Timeout(timeout))??;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Single-shot generation. `timeout` bounds the whole exchange.
    pub async fn generate(&self, request: &GenerateRequest, timeout: Duration) -> Result<String> {
        debug!(model = %request.model, structured = request.format.is_some(), "Ollama generate request");

        let exchange = async {
            let response = self.send(request, timeout).await?;
            let body: GenerateResponse = response.json().await?;
            Ok::<_, AiError>(body)
        };

        let body = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| AiError::Timeout(timeout))??;

        if let Some(error) = body.error {
            return Err(AiError::Backend(error));
        }

        Ok(body.response)
    }

    /// Streaming generation. `idle_timeout` bounds the wait for the response
    /// headers and for each subsequent chunk.
    pub async fn generate_stream(
        &self,
        request: &GenerateRequest,
        idle_timeout: Duration,
    ) -> Result<TextStream> {
        debug!(model = %request.model, "Ollama streaming generate request");

        let response = self.send(request, idle_timeout).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut buf: Vec<u8> = Vec::new();
            let mut done = false;

            while !done {
                let next = tokio::time::timeout(idle_timeout, bytes.next())
                    .await
                    .map_err(|_| AiError::Timeout(idle_timeout))?;
                let Some(chunk) = next else { break };
                buf.extend_from_slice(&chunk.map_err(AiError::from)?);

                for line in take_complete_lines(&mut buf) {
                    if let Some(piece) = decode_line(&line)? {
                        done = piece.done;
                        if !piece.response.is_empty() {
                            yield piece.response;
                        }
                    }
                }
            }

            // Final object without a trailing newline.
            if !done {
                if let Some(piece) = decode_line(&buf)? {
                    if !piece.response.is_empty() {
                        yield piece.response;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Split off every complete `\n`-terminated line, leaving any partial tail in `buf`.
pub(crate) fn take_complete_lines(buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let mut line: Vec<u8> = buf.drain(..=pos).collect();
        line.pop();
        lines.push(line);
    }
    lines
}

pub(crate) fn decode_line(line: &[u8]) -> Result<Option<GenerateResponse>> {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    let piece: GenerateResponse = serde_json::from_slice(line)?;
    if let Some(error) = piece.error {
        return Err(AiError::Backend(error));
    }
    Ok(Some(piece))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_lines_are_split_and_tail_kept() {
        let mut buf = b"{\"response\":\"a\"}\n{\"response\":\"b\"}\n{\"resp".to_vec();
        let lines = take_complete_lines(&mut buf);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], b"{\"response\":\"a\"}".to_vec());
        assert_eq!(buf, b"{\"resp".to_vec());
    }

    #[test]
    fn blank_lines_decode_to_none() {
        assert!(decode_line(b"  ").unwrap().is_none());
        assert!(decode_line(b"").unwrap().is_none());
    }

    #[test]
    fn error_objects_surface_as_backend_errors() {
        let err = decode_line(br#"{"error":"out of memory"}"#).unwrap_err();
        assert!(matches!(err, AiError::Backend(ref m) if m == "out of memory"));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = decode_line(b"not json").unwrap_err();
        assert!(matches!(err, AiError::Parse(_)));
    }
}
