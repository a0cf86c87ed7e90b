use serde::{Serialize, Serializer};

use crate::types::SourceCard;

/// One progress update pushed by the orchestrator to whoever is streaming
/// the response.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Status(String),
    /// Verdict text so far. `sources` is set on the first result event only.
    PartialResult {
        text: String,
        sources: Option<Vec<SourceCard>>,
    },
    Error(String),
    Complete,
}

impl PipelineEvent {
    pub fn status(message: impl Into<String>) -> Self {
        PipelineEvent::Status(message.into())
    }

    /// `{error}` and `{complete}` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Error(_) | PipelineEvent::Complete)
    }

    /// Serialize as one newline-terminated JSON record.
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Wire<'a> {
    Status {
        status: &'a str,
    },
    Result {
        result: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        sources: Option<&'a [SourceCard]>,
    },
    Error {
        error: &'a str,
    },
    Complete {
        complete: bool,
    },
}

impl Serialize for PipelineEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            PipelineEvent::Status(status) => Wire::Status { status },
            PipelineEvent::PartialResult { text, sources } => Wire::Result {
                result: text,
                sources: sources.as_deref(),
            },
            PipelineEvent::Error(error) => Wire::Error { error },
            PipelineEvent::Complete => Wire::Complete { complete: true },
        };
        wire.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Relevance;
    use serde_json::json;

    fn to_value(event: &PipelineEvent) -> serde_json::Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn status_and_error_records() {
        assert_eq!(
            to_value(&PipelineEvent::status("Searching for relevant sources...")),
            json!({"status": "Searching for relevant sources..."})
        );
        assert_eq!(
            to_value(&PipelineEvent::Error("No valid sources found".into())),
            json!({"error": "No valid sources found"})
        );
        assert_eq!(to_value(&PipelineEvent::Complete), json!({"complete": true}));
    }

    #[test]
    fn result_includes_sources_only_when_present() {
        let first = PipelineEvent::PartialResult {
            text: "## Verdict".into(),
            sources: Some(vec![SourceCard {
                title: "Eiffel Tower".into(),
                url: "https://example.org/eiffel".into(),
                relevance: Relevance::new(9.0, "Directly addresses the location"),
            }]),
        };
        assert_eq!(
            to_value(&first),
            json!({
                "result": "## Verdict",
                "sources": [{
                    "title": "Eiffel Tower",
                    "url": "https://example.org/eiffel",
                    "relevance": {"score": 9.0, "explanation": "Directly addresses the location"}
                }]
            })
        );

        let later = PipelineEvent::PartialResult {
            text: "## Verdict: False".into(),
            sources: None,
        };
        assert_eq!(to_value(&later), json!({"result": "## Verdict: False"}));
    }

    #[test]
    fn ndjson_lines_are_single_line() {
        let line = PipelineEvent::PartialResult {
            text: "line one\nline two".into(),
            sources: None,
        }
        .to_ndjson()
        .unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn terminal_events() {
        assert!(PipelineEvent::Complete.is_terminal());
        assert!(PipelineEvent::Error("x".into()).is_terminal());
        assert!(!PipelineEvent::status("x").is_terminal());
    }
}
