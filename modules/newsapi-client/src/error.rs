use thiserror::Error;

pub type Result<T> = std::result::Result<T, NewsApiError>;

#[derive(Debug, Error)]
pub enum NewsApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited (retry after {retry_after:?} seconds)")]
    RateLimited { retry_after: Option<u64> },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl NewsApiError {
    /// True for errors worth retrying after a short delay: transport
    /// failures and server-side 5xx responses. Rate limiting has its
    /// own retry path driven by `retry_after`.
    pub fn is_transient(&self) -> bool {
        match self {
            NewsApiError::Network(_) => true,
            NewsApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for NewsApiError {
    fn from(err: reqwest::Error) -> Self {
        NewsApiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for NewsApiError {
    fn from(err: serde_json::Error) -> Self {
        NewsApiError::Parse(err.to_string())
    }
}
