//! HTTP implementations of the chat and score model contracts.
//!
//! - [`OpenAiChatModel`]: any OpenAI-compatible `/chat/completions` endpoint
//! - [`HttpScoreModel`]: a cross-encoder `/rerank` service

mod chat;
mod config;
mod error;
mod http;
mod rerank;

pub use chat::OpenAiChatModel;
pub use config::{ChatProviderConfig, RerankProviderConfig};
pub use error::{ProviderError, Result};
pub use rerank::HttpScoreModel;
