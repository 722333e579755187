use crate::result::StrategyId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("{strategy} backend failed: {message}")]
    Backend {
        strategy: StrategyId,
        message: String,
    },

    #[error("{strategy} search was cancelled")]
    Cancelled { strategy: StrategyId },

    #[error("{strategy} search timed out after {elapsed_ms}ms")]
    TimedOut { strategy: StrategyId, elapsed_ms: u64 },

    #[error("Invalid query for {strategy}: {reason}")]
    InvalidQuery {
        strategy: StrategyId,
        reason: String,
    },

    #[error("Unknown retrieval strategy: {0}")]
    UnknownStrategy(String),

    #[error("Reranking error: {0}")]
    Reranking(String),
}

impl RetrievalError {
    /// Strategy the error belongs to, if it is strategy-local.
    pub fn strategy(&self) -> Option<StrategyId> {
        match self {
            RetrievalError::Backend { strategy, .. }
            | RetrievalError::Cancelled { strategy }
            | RetrievalError::TimedOut { strategy, .. }
            | RetrievalError::InvalidQuery { strategy, .. } => Some(*strategy),
            RetrievalError::UnknownStrategy(_) | RetrievalError::Reranking(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetrievalError::Cancelled { .. })
    }
}

/// Failure reported by an external search or scoring primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
