use crate::error::{Result, RetrievalError};
use crate::fusion::ResultMerger;
use crate::result::{Query, RankedList, StrategyId};
use crate::retriever::Retriever;
use async_trait::async_trait;
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Vector and BM25 run concurrently and fused with RRF.
///
/// Either half may fail; the strategy only fails when both do.
pub struct HybridRetriever {
    vector: Arc<dyn Retriever>,
    keyword: Arc<dyn Retriever>,
    merger: ResultMerger,
    weights: BTreeMap<StrategyId, f64>,
}

impl HybridRetriever {
    pub fn new(
        vector: Arc<dyn Retriever>,
        keyword: Arc<dyn Retriever>,
        merger: ResultMerger,
        weights: BTreeMap<StrategyId, f64>,
    ) -> Self {
        Self {
            vector,
            keyword,
            merger,
            weights,
        }
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    fn strategy(&self) -> StrategyId {
        StrategyId::Hybrid
    }

    fn description(&self) -> &'static str {
        "Semantic and keyword search fused together; a strong general default"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedList> {
        let (vector, keyword) = tokio::join!(
            self.vector.retrieve(query, top_k, cancel),
            self.keyword.retrieve(query, top_k, cancel)
        );

        let mut lists = BTreeMap::new();
        let mut failures = Vec::new();
        for (strategy, outcome) in [
            (self.vector.strategy(), vector),
            (self.keyword.strategy(), keyword),
        ] {
            match outcome {
                Ok(list) => {
                    lists.insert(strategy, list);
                }
                Err(err) => {
                    warn!("hybrid: {strategy} half failed: {err}");
                    failures.push(err);
                }
            }
        }

        if lists.is_empty() {
            if failures.iter().any(RetrievalError::is_cancelled) {
                return Err(RetrievalError::Cancelled {
                    strategy: StrategyId::Hybrid,
                });
            }
            let message = failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RetrievalError::Backend {
                strategy: StrategyId::Hybrid,
                message,
            });
        }

        let nodes = self
            .merger
            .merge(&lists, &self.weights)
            .into_iter()
            .take(top_k)
            .map(|fused| fused.into_node(StrategyId::Hybrid))
            .collect();
        Ok(RankedList::from_scored(nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::strategies::testing::CannedBackend;
    use crate::strategies::{Bm25Retriever, VectorRetriever};
    use pretty_assertions::assert_eq;

    fn hybrid(vector: CannedBackend, keyword: CannedBackend) -> HybridRetriever {
        HybridRetriever::new(
            Arc::new(VectorRetriever::new(Arc::new(vector))),
            Arc::new(Bm25Retriever::new(Arc::new(keyword))),
            ResultMerger::new(60.0),
            BTreeMap::new(),
        )
    }

    #[tokio::test]
    async fn test_hybrid_fuses_both_halves() {
        let retriever = hybrid(
            CannedBackend::with_ids(&["a", "b"]),
            CannedBackend::with_ids(&["b", "c"]),
        );
        let list = retriever
            .retrieve(&Query::new("pooling"), 10, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<_> = list.iter().map(|n| n.id.clone().unwrap()).collect();
        assert_eq!(ids[0], "b");
        assert_eq!(list.len(), 3);
        assert!(list.iter().all(|n| n.source == StrategyId::Hybrid));
        assert_eq!(
            list.nodes()[0].metadata.get("fused_from"),
            Some(&serde_json::json!(["vector", "bm25"]))
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_hybrid_survives_one_failing_half() {
        let retriever = hybrid(
            CannedBackend::failing(BackendError::Unavailable("down".to_string())),
            CannedBackend::with_ids(&["k"]),
        );
        let list = retriever
            .retrieve(&Query::new("pooling"), 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_hybrid_fails_when_both_halves_fail() {
        let retriever = hybrid(
            CannedBackend::failing(BackendError::Unavailable("vector down".to_string())),
            CannedBackend::failing(BackendError::Other("bm25 down".to_string())),
        );
        let err = retriever
            .retrieve(&Query::new("pooling"), 10, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.strategy(), Some(StrategyId::Hybrid));
        let message = err.to_string();
        assert!(message.contains("vector down"));
        assert!(message.contains("bm25 down"));
    }
}
