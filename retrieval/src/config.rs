use crate::result::StrategyId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for reciprocal rank fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// RRF constant k (higher = less emphasis on top results)
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// Per-strategy weights; strategies without an entry weigh 1.0
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<StrategyId, f64>,

    /// Strategies fanned out together when a query is routed to a fixed multi-strategy set
    #[serde(default = "default_multi_strategies")]
    pub multi_strategies: Vec<StrategyId>,
}

/// Configuration for the optional rerank stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of results kept after reranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Passages sent to the score model per call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Budget for the whole rerank stage
    #[serde(default = "default_rerank_timeout_ms")]
    pub timeout_ms: u64,
}

pub const DEFAULT_WEIGHT: f64 = 1.0;

fn default_rrf_k() -> f64 {
    60.0
}

fn default_weights() -> BTreeMap<StrategyId, f64> {
    BTreeMap::from([(StrategyId::Vector, 1.0), (StrategyId::Bm25, 1.0)])
}

fn default_multi_strategies() -> Vec<StrategyId> {
    vec![StrategyId::Vector, StrategyId::Bm25]
}

fn default_true() -> bool {
    true
}

fn default_top_n() -> usize {
    10
}

fn default_batch_size() -> usize {
    16
}

fn default_rerank_timeout_ms() -> u64 {
    3_000
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            weights: default_weights(),
            multi_strategies: default_multi_strategies(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_n: default_top_n(),
            batch_size: default_batch_size(),
            timeout_ms: default_rerank_timeout_ms(),
        }
    }
}

impl FusionConfig {
    pub fn weight_for(&self, strategy: StrategyId) -> f64 {
        self.weights.get(&strategy).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    /// Weights restricted to `strategies`, with defaults filled in.
    pub fn weights_for(&self, strategies: &[StrategyId]) -> BTreeMap<StrategyId, f64> {
        strategies
            .iter()
            .map(|strategy| (*strategy, self.weight_for(*strategy)))
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return Err(format!("rrf_k must be > 0, got {}", self.rrf_k));
        }

        for (strategy, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(format!(
                    "weight for {strategy} must be a non-negative number, got {weight}"
                ));
            }
        }

        if self.multi_strategies.is_empty() {
            return Err("multi_strategies must name at least one strategy".to_string());
        }

        for (i, strategy) in self.multi_strategies.iter().enumerate() {
            if self.multi_strategies[..i].contains(strategy) {
                return Err(format!("multi_strategies lists {strategy} twice"));
            }
        }

        Ok(())
    }
}

impl RerankConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.top_n == 0 {
            return Err("rerank.top_n must be > 0".to_string());
        }

        if self.batch_size == 0 {
            return Err("rerank.batch_size must be > 0".to_string());
        }

        if self.timeout_ms == 0 {
            return Err("rerank.timeout_ms must be > 0".to_string());
        }

        Ok(())
    }
}
