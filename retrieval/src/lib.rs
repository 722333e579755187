/*!
# Ragroute Retrieval

Retrieval strategies and the result plumbing shared by the router, the
planning agent and the orchestration engine:

- **Strategies**: vector, BM25, hybrid, grep, files-via-metadata and
  files-via-content, each a [`Retriever`] over a pluggable backend
- **Reciprocal Rank Fusion** ([`ResultMerger`]) with weighted, deterministic
  tie-breaking
- **Reranking** ([`Reranker`]) over any [`ScoreModel`], with a lexical
  fallback model
- **In-memory backends** ([`InMemoryIndex`]) for local corpora and tests

## Architecture

```text
Query
  ├─> Retriever (one per StrategyId)
  │     └─> backend (VectorSearch / KeywordSearch / FileSystemSearch)
  │           └─> RankedList
  └─> ResultMerger (RRF over all lists)
        └─> Vec<FusedResult>
              └─> Reranker (optional)
```

Every retriever observes a [`CancellationToken`](tokio_util::sync::CancellationToken)
and returns [`RetrievalError::Cancelled`] once it fires.
*/

mod backend;
mod config;
mod error;
mod fusion;
mod memory;
mod rerank;
mod result;
mod retriever;
mod strategies;
mod text;

pub use backend::{FileSystemSearch, KeywordSearch, SearchScope, VectorSearch};
pub use config::{DEFAULT_WEIGHT, FusionConfig, RerankConfig};
pub use error::{BackendError, Result, RetrievalError};
pub use fusion::ResultMerger;
pub use memory::{InMemoryIndex, IndexedDocument};
pub use rerank::{LexicalScoreModel, Reranker, ScoreModel};
pub use result::{FusedResult, Query, RankedList, ScoredNode, StrategyId};
pub use retriever::Retriever;
pub use strategies::{
    Bm25Retriever, FilesViaContentRetriever, FilesViaMetadataRetriever, GrepRetriever,
    HybridRetriever, VectorRetriever,
};
pub use text::{looks_like_path, path_tokens, quoted_phrase, significant_terms};
