use thiserror::Error;

/// Failure of a single query against the search backend.
///
/// An empty hit list is never reported through this type.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    #[error("search backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed search response: {0}")]
    Malformed(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl SearchError {
    /// Transport failures and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed(_) | Self::InvalidQuery(_) => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
