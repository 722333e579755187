//! Contracts for the external search primitives the strategies wrap.
//!
//! Implementations are shared across concurrent queries and must be
//! thread-safe. Nodes they return may carry any `source`; the strategy
//! adapters stamp their own.

use crate::error::BackendError;
use crate::result::ScoredNode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding + nearest-neighbour search.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<ScoredNode>, BackendError>;
}

/// Lexical (BM25) search.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<ScoredNode>, BackendError>;
}

/// What a [`FileSystemSearch`] pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Regex over individual lines of indexed text
    Lines,
    /// Fuzzy match over file names and paths
    FileNames,
    /// Relevance of whole files to a free-text pattern
    FileContents,
}

/// Raw-text and file-level search.
#[async_trait]
pub trait FileSystemSearch: Send + Sync {
    async fn search(
        &self,
        pattern: &str,
        scope: SearchScope,
        top_k: usize,
    ) -> Result<Vec<ScoredNode>, BackendError>;
}
