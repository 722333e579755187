use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to the chat model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("chat model unavailable: {0}")]
    Unavailable(String),

    #[error("chat model timed out after {0}ms")]
    Timeout(u64),

    #[error("invalid chat response: {0}")]
    InvalidResponse(String),
}

/// Why a tool call produced no output. Recorded in the trace, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("tool failed: {message}")]
    Failed { message: String },

    #[error("tool timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("tool call was cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent run was cancelled")]
    Cancelled,

    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
