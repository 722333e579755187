use ragroute_agent::ChatError;
use ragroute_retrieval::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Whether retrying against the same endpoint could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::Http(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::MissingApiKey(_)
            | ProviderError::InvalidConfig(_)
            | ProviderError::InvalidResponse(_) => false,
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(ms) => ChatError::Timeout(ms),
            ProviderError::InvalidResponse(message) => ChatError::InvalidResponse(message),
            other => ChatError::Unavailable(other.to_string()),
        }
    }
}

impl From<ProviderError> for BackendError {
    fn from(err: ProviderError) -> Self {
        if err.is_transient() {
            BackendError::Unavailable(err.to_string())
        } else {
            BackendError::Other(err.to_string())
        }
    }
}
