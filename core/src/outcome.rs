use crate::fallback::{DegradationLevel, LevelTransition};
use ragroute_agent::{AgentTrace, BudgetSnapshot};
use ragroute_retrieval::{FusedResult, StrategyId};
use ragroute_router::RoutingDecision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a query produced. Degradation is reported here, not as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub results: Vec<FusedResult>,

    /// Present when the agent ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<AgentTrace>,

    pub degraded_to: DegradationLevel,

    pub routing: RoutingDecision,

    pub transitions: Vec<LevelTransition>,

    pub stats: OutcomeStats,
}

impl RetrievalOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Provenance of the results: agent sources when the agent ran, result
    /// ids otherwise.
    pub fn sources(&self) -> Vec<String> {
        if let Some(trace) = &self.trace
            && self.degraded_to == DegradationLevel::None
        {
            return trace.sources();
        }
        self.results
            .iter()
            .map(|result| {
                result
                    .node
                    .id
                    .clone()
                    .unwrap_or_else(|| result.node.dedup_key())
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RerankStatus {
    /// Disabled, or there was nothing to rerank
    #[default]
    NotRequested,
    Applied,
    /// The reranker failed or ran out of time; pre-rerank order was kept
    Skipped { reason: String },
}

/// Per-stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub routing_ms: u64,
    pub retrieval_ms: u64,
    pub agent_ms: u64,
    pub fusion_ms: u64,
    pub rerank_ms: u64,
    pub fallback_ms: u64,
    pub total_ms: u64,
}

/// Query statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub timings: StageTimings,

    /// Wall time of each strategy that ran
    pub strategy_ms: BTreeMap<StrategyId, u64>,

    /// Strategies that failed, timed out or were cut off
    pub strategy_errors: BTreeMap<StrategyId, String>,

    /// Nodes returned across all strategies before fusion
    pub candidates: usize,

    pub llm_calls: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetSnapshot>,

    pub rerank: RerankStatus,

    /// The overall query deadline elapsed
    pub timed_out: bool,
}
