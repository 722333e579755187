use crate::config::{DEFAULT_WEIGHT, FusionConfig};
use crate::result::{FusedResult, RankedList, StrategyId};
use log::debug;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Combines ranked lists from several strategies with weighted reciprocal rank fusion.
///
/// A node at 1-based rank `r` in the list of strategy `s` contributes
/// `weight(s) / (k + r)`. Nodes are identified by [`ScoredNode::dedup_key`],
/// and the first occurrence (in strategy order) is the one kept.
///
/// [`ScoredNode::dedup_key`]: crate::ScoredNode::dedup_key
#[derive(Debug, Clone)]
pub struct ResultMerger {
    rrf_k: f64,
}

struct Candidate {
    result: FusedResult,
    order: usize,
}

impl ResultMerger {
    pub fn new(rrf_k: f64) -> Self {
        Self { rrf_k }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.rrf_k)
    }

    pub fn rrf_k(&self) -> f64 {
        self.rrf_k
    }

    /// Fuse `lists` into one deduplicated ranking.
    ///
    /// Ordering is fused score descending, then number of contributing
    /// strategies descending, then best rank ascending, then first-seen order.
    /// The output depends only on the input values.
    pub fn merge(
        &self,
        lists: &BTreeMap<StrategyId, RankedList>,
        weights: &BTreeMap<StrategyId, f64>,
    ) -> Vec<FusedResult> {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for (strategy, list) in lists {
            let weight = weights.get(strategy).copied().unwrap_or(DEFAULT_WEIGHT);
            let mut seen_in_list = BTreeSet::new();

            for (position, node) in list.iter().enumerate() {
                let key = node.dedup_key();
                if !seen_in_list.insert(key.clone()) {
                    continue;
                }

                let rank = position + 1;
                let contribution = weight / (self.rrf_k + rank as f64);

                match by_key.get(&key) {
                    Some(&index) => {
                        let fused = &mut candidates[index].result;
                        fused.fused_score += contribution;
                        fused.contributing_strategies.push(*strategy);
                        fused.best_rank = fused.best_rank.min(rank);
                    }
                    None => {
                        let order = candidates.len();
                        by_key.insert(key, order);
                        candidates.push(Candidate {
                            result: FusedResult {
                                node: node.clone(),
                                fused_score: contribution,
                                contributing_strategies: vec![*strategy],
                                best_rank: rank,
                                rerank_score: None,
                            },
                            order,
                        });
                    }
                }
            }
        }

        candidates.sort_by(compare_candidates);

        debug!(
            "RRF fused {} lists into {} results (k={})",
            lists.len(),
            candidates.len(),
            self.rrf_k
        );

        candidates.into_iter().map(|c| c.result).collect()
    }
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::from_config(&FusionConfig::default())
    }
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.result
        .fused_score
        .total_cmp(&a.result.fused_score)
        .then_with(|| {
            b.result
                .contributing_strategies
                .len()
                .cmp(&a.result.contributing_strategies.len())
        })
        .then_with(|| a.result.best_rank.cmp(&b.result.best_rank))
        .then_with(|| a.order.cmp(&b.order))
}
