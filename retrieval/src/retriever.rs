use crate::error::{BackendError, Result, RetrievalError};
use crate::result::{Query, RankedList, ScoredNode, StrategyId};
use async_trait::async_trait;
use ragroute_async_utils::OrCancelExt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// A single retrieval strategy.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn strategy(&self) -> StrategyId;

    /// One-line description shown to the planning agent.
    fn description(&self) -> &'static str;

    /// Return at most `top_k` nodes for `query`, best first.
    ///
    /// Implementations must return `RetrievalError::Cancelled` promptly once
    /// `cancel` fires.
    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedList>;
}

/// Drive one backend call under `cancel` and turn its output into a ranked
/// list owned by `strategy`.
pub(crate) async fn run_backend<F>(
    strategy: StrategyId,
    query: &Query,
    top_k: usize,
    cancel: &CancellationToken,
    call: F,
) -> Result<RankedList>
where
    F: Future<Output = std::result::Result<Vec<ScoredNode>, BackendError>> + Send,
{
    let nodes = call
        .or_cancel(cancel)
        .await
        .map_err(|_| RetrievalError::Cancelled { strategy })?
        .map_err(|err| RetrievalError::Backend {
            strategy,
            message: err.to_string(),
        })?;

    Ok(stamp(strategy, query, nodes, top_k))
}

/// Apply the query filters, claim the nodes for `strategy` and cut to `top_k`.
pub(crate) fn stamp(
    strategy: StrategyId,
    query: &Query,
    nodes: Vec<ScoredNode>,
    top_k: usize,
) -> RankedList {
    let nodes = nodes
        .into_iter()
        .filter(|node| query.accepts(node))
        .map(|mut node| {
            node.source = strategy;
            node
        })
        .collect();
    let mut list = RankedList::from_scored(nodes);
    list.truncate(top_k);
    list
}

pub(crate) fn require_text(strategy: StrategyId, query: &Query) -> Result<()> {
    if query.text().trim().is_empty() {
        return Err(RetrievalError::InvalidQuery {
            strategy,
            reason: "query text is empty".to_string(),
        });
    }
    Ok(())
}
