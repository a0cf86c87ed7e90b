use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FactCheckError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Search failed: {0}")]
    SearchUnavailable(String),

    #[error("No valid sources found")]
    NoSources,

    #[error("Unable to generate fact check response: {0}")]
    SynthesisFailure(String),

    #[error("Client disconnected")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FactCheckError {
    /// Failures that end a run with an `{error}` event. `Cancelled` ends the
    /// run silently since nobody is listening.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, FactCheckError::Cancelled)
    }
}
