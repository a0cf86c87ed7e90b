use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearxngError>;

#[derive(Debug, Error)]
pub enum SearxngError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Search timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed search response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SearxngError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearxngError::Timeout
        } else {
            SearxngError::Network(err.to_string())
        }
    }
}
