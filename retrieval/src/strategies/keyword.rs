use crate::backend::KeywordSearch;
use crate::error::Result;
use crate::result::{Query, RankedList, StrategyId};
use crate::retriever::{Retriever, require_text, run_backend};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lexical BM25 search.
pub struct Bm25Retriever {
    backend: Arc<dyn KeywordSearch>,
}

impl Bm25Retriever {
    pub fn new(backend: Arc<dyn KeywordSearch>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Retriever for Bm25Retriever {
    fn strategy(&self) -> StrategyId {
        StrategyId::Bm25
    }

    fn description(&self) -> &'static str {
        "Keyword (BM25) search; best for exact identifiers, error messages and rare terms"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedList> {
        require_text(StrategyId::Bm25, query)?;
        run_backend(
            StrategyId::Bm25,
            query,
            top_k,
            cancel,
            self.backend.search(query.text(), top_k),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::CannedBackend;
    use crate::result::ScoredNode;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_bm25_applies_query_filters() {
        let mut backend = CannedBackend::default();
        backend.nodes = vec![
            ScoredNode::new(Some("a".into()), "alpha", 2.0, StrategyId::Vector)
                .with_metadata("lang", "rust"),
            ScoredNode::new(Some("b".into()), "beta", 1.0, StrategyId::Vector)
                .with_metadata("lang", "go"),
        ];
        let retriever = Bm25Retriever::new(Arc::new(backend));
        let query = Query::new("alpha beta").with_filter("lang", "go");

        let list = retriever
            .retrieve(&query, 10, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<_> = list.iter().map(|n| n.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(list.nodes()[0].source, StrategyId::Bm25);
    }
}
