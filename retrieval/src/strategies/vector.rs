use crate::backend::VectorSearch;
use crate::error::Result;
use crate::result::{Query, RankedList, StrategyId};
use crate::retriever::{Retriever, require_text, run_backend};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Semantic similarity search.
pub struct VectorRetriever {
    backend: Arc<dyn VectorSearch>,
}

impl VectorRetriever {
    pub fn new(backend: Arc<dyn VectorSearch>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    fn strategy(&self) -> StrategyId {
        StrategyId::Vector
    }

    fn description(&self) -> &'static str {
        "Semantic search over embedded passages; best for conceptual questions"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedList> {
        require_text(StrategyId::Vector, query)?;
        run_backend(
            StrategyId::Vector,
            query,
            top_k,
            cancel,
            self.backend.search(query.text(), top_k),
        )
        .await
    }
}
