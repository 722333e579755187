use crate::common::{SIMPLE_QUERY, builder};
use pretty_assertions::assert_eq;
use ragroute_core::{DegradationLevel, EngineConfig, Query, RoutingMode, StrategyId};
use ragroute_router::RouteRule;

#[tokio::test]
async fn filename_query_goes_to_metadata_search() {
    let engine = builder(EngineConfig::default()).build().unwrap();

    let decision = engine.route(&Query::new("README.md 在哪"));
    assert_eq!(decision.mode, RoutingMode::Single);
    assert_eq!(decision.strategies, vec![StrategyId::FilesViaMetadata]);

    let outcome = engine.query("README.md 在哪").await.unwrap();
    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert_eq!(
        outcome.results[0].node.path(),
        Some("README.md"),
        "{:?}",
        outcome.results
    );
}

#[tokio::test]
async fn filename_glued_to_cjk_text_is_still_found() {
    let engine = builder(EngineConfig::default()).build().unwrap();

    let outcome = engine.query("README.md在哪").await.unwrap();
    assert_eq!(outcome.routing.strategies, vec![StrategyId::FilesViaMetadata]);
    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert_eq!(outcome.results[0].node.path(), Some("README.md"));
}

#[tokio::test]
async fn filename_rule_beats_broad_keyword() {
    let engine = builder(EngineConfig::default()).build().unwrap();
    let decision = engine.route(&Query::new("give me an overview of docs/retry.md"));
    assert_eq!(decision.rule, RouteRule::FileName);
    assert_eq!(decision.strategies, vec![StrategyId::FilesViaMetadata]);
}

#[tokio::test]
async fn simple_query_uses_vector_and_reranks() {
    let engine = builder(EngineConfig::default()).build().unwrap();

    let outcome = engine.query(SIMPLE_QUERY).await.unwrap();

    assert_eq!(outcome.routing.strategies, vec![StrategyId::Vector]);
    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert!(outcome.transitions.is_empty());
    assert_eq!(outcome.results[0].node.id.as_deref(), Some("retry"));
    assert!(outcome.results.iter().all(|r| r.rerank_score.is_some()));
    assert!(outcome.trace.is_none());
}

#[tokio::test]
async fn disabled_vector_falls_back_to_first_enabled_strategy() {
    let mut config = EngineConfig::default();
    config.strategies.vector = false;
    config.strategies.bm25 = false;
    let engine = builder(config).build().unwrap();

    let decision = engine.route(&Query::new(SIMPLE_QUERY));
    assert_eq!(decision.strategies, vec![StrategyId::Hybrid]);
}

#[tokio::test]
async fn max_results_caps_output() {
    let engine = builder(EngineConfig::default()).build().unwrap();
    let outcome = engine
        .query_with(
            Query::new("retry backoff connection").with_max_results(2),
            tokio_util::sync::CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(outcome.results.len() <= 2);
}
