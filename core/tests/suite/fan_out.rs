use crate::common::{BrokenBackend, BrokenScoreModel, COMPLEX_QUERY, ShortestFirst, corpus};
use pretty_assertions::assert_eq;
use ragroute_core::{
    DegradationLevel, EngineBuilder, EngineConfig, RerankStatus, RoutingMode, StrategyId,
};
use std::time::Duration;

fn multi_config() -> EngineConfig {
    EngineConfig {
        strategy_timeout_ms: 100,
        ..Default::default()
    }
}

#[tokio::test]
async fn complex_query_without_agent_fans_out_and_fuses() {
    let engine = EngineBuilder::new(multi_config())
        .in_memory(corpus())
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert_eq!(outcome.routing.mode, RoutingMode::MultiFixed);
    assert_eq!(
        outcome.routing.strategies,
        vec![StrategyId::Vector, StrategyId::Bm25]
    );
    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert!(
        outcome
            .results
            .iter()
            .any(|r| r.contributing_strategies.len() == 2)
    );
    assert_eq!(outcome.stats.rerank, RerankStatus::Applied);
    assert_eq!(outcome.stats.llm_calls, 0);
}

#[test_log::test(tokio::test)]
async fn timed_out_strategy_is_partial_input_not_degradation() {
    let index = corpus();
    let engine = EngineBuilder::new(multi_config())
        .vector_search(BrokenBackend::stalled(Duration::from_secs(10)))
        .keyword_search(index.clone())
        .filesystem_search(index)
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert!(outcome.transitions.is_empty());
    assert!(!outcome.results.is_empty());
    assert!(
        outcome
            .results
            .iter()
            .all(|r| r.contributing_strategies == vec![StrategyId::Bm25])
    );
    let vector_error = &outcome.stats.strategy_errors[&StrategyId::Vector];
    assert!(vector_error.contains("timed out"), "{vector_error}");
}

#[tokio::test]
async fn rerank_failure_keeps_fused_order() {
    let engine = EngineBuilder::new(multi_config())
        .in_memory(corpus())
        .score_model(std::sync::Arc::new(BrokenScoreModel))
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert!(matches!(outcome.stats.rerank, RerankStatus::Skipped { .. }));
    assert!(outcome.results.iter().all(|r| r.rerank_score.is_none()));
    let fused: Vec<f64> = outcome.results.iter().map(|r| r.fused_score).collect();
    let mut sorted = fused.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));
    assert_eq!(fused, sorted);
}

#[tokio::test]
async fn rerank_reorders_by_score_model() {
    let engine = EngineBuilder::new(multi_config())
        .in_memory(corpus())
        .score_model(std::sync::Arc::new(ShortestFirst))
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    let lengths: Vec<usize> = outcome.results.iter().map(|r| r.node.text.len()).collect();
    let mut sorted = lengths.clone();
    sorted.sort_unstable();
    assert_eq!(lengths, sorted);
}

#[tokio::test]
async fn fast_preset_skips_rerank() {
    let engine = EngineBuilder::new(EngineConfig::fast())
        .in_memory(corpus())
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert_eq!(outcome.stats.rerank, RerankStatus::NotRequested);
    assert!(!engine.agent_available());
    assert!(!engine.strategies().contains(&StrategyId::Hybrid));
}
