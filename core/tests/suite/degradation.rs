use crate::common::{
    BrokenBackend, COMPLEX_QUERY, SIMPLE_QUERY, ScriptedChat, builder, corpus,
};
use pretty_assertions::assert_eq;
use ragroute_core::{
    AgentState, DegradationLevel, EngineBuilder, EngineConfig, OrchestrationError,
    RetrievalOutcome, RoutingMode,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn broken_engine(config: EngineConfig) -> EngineBuilder {
    let broken = BrokenBackend::failing();
    EngineBuilder::new(config)
        .vector_search(broken.clone())
        .keyword_search(broken.clone())
        .filesystem_search(broken)
}

fn assert_monotonic(outcome: &RetrievalOutcome) {
    for transition in &outcome.transitions {
        assert!(transition.from < transition.to, "{transition:?}");
    }
    for pair in outcome.transitions.windows(2) {
        assert_eq!(pair[0].to, pair[1].from);
    }
    if let Some(last) = outcome.transitions.last() {
        assert_eq!(last.to, outcome.degraded_to);
    }
}

#[test_log::test(tokio::test)]
async fn everything_down_degrades_to_pure_generation() {
    let engine = broken_engine(EngineConfig::default())
        .chat_model(ScriptedChat::failing())
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert_eq!(outcome.routing.mode, RoutingMode::Agentic);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.degraded_to, DegradationLevel::PureGeneration);
    assert_eq!(
        outcome
            .transitions
            .iter()
            .map(|t| t.to)
            .collect::<Vec<_>>(),
        vec![DegradationLevel::SingleStrategy, DegradationLevel::PureGeneration]
    );
    assert_eq!(
        outcome.trace.as_ref().and_then(|t| t.outcome()),
        Some(AgentState::Aborted)
    );
    assert_monotonic(&outcome);
}

#[tokio::test]
async fn llm_down_falls_back_to_vector() {
    let engine = builder(EngineConfig::default())
        .chat_model(ScriptedChat::failing())
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert_eq!(outcome.degraded_to, DegradationLevel::SingleStrategy);
    assert!(!outcome.results.is_empty());
    assert!(outcome.results.iter().all(|r| r.rerank_score.is_none()));
    assert!(outcome.transitions[0].cause.contains("LLM"));
    assert_monotonic(&outcome);
}

#[tokio::test]
async fn vector_down_on_vector_route_skips_single_strategy_level() {
    let index = corpus();
    let engine = EngineBuilder::new(EngineConfig::default())
        .vector_search(BrokenBackend::failing())
        .keyword_search(index.clone())
        .filesystem_search(index)
        .build()
        .unwrap();

    let outcome = engine.query(SIMPLE_QUERY).await.unwrap();

    assert_eq!(outcome.degraded_to, DegradationLevel::PureGeneration);
    assert_eq!(outcome.transitions.len(), 1);
    assert_eq!(outcome.transitions[0].from, DegradationLevel::None);
    assert!(outcome.stats.strategy_errors.contains_key(&ragroute_core::StrategyId::Vector));
    assert_monotonic(&outcome);
}

#[tokio::test]
async fn degradation_is_monotonic_across_failure_modes() {
    let healthy = builder(EngineConfig::default()).build().unwrap();
    let llm_down = builder(EngineConfig::default())
        .chat_model(ScriptedChat::failing())
        .build()
        .unwrap();
    let all_down = broken_engine(EngineConfig::default())
        .chat_model(ScriptedChat::failing())
        .build()
        .unwrap();

    let mut levels = Vec::new();
    for engine in [&healthy, &llm_down, &all_down] {
        let outcome = engine.query(COMPLEX_QUERY).await.unwrap();
        assert_monotonic(&outcome);
        levels.push(outcome.degraded_to);
    }

    assert_eq!(
        levels,
        vec![
            DegradationLevel::None,
            DegradationLevel::SingleStrategy,
            DegradationLevel::PureGeneration,
        ]
    );
}

#[tokio::test]
async fn overall_timeout_degrades_without_error() {
    let config = EngineConfig {
        timeout_seconds: 1,
        ..Default::default()
    };
    let stalled = BrokenBackend::stalled(Duration::from_secs(30));
    let engine = EngineBuilder::new(config)
        .vector_search(stalled.clone())
        .keyword_search(stalled.clone())
        .filesystem_search(stalled)
        .build()
        .unwrap();

    let started = Instant::now();
    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.degraded_to, DegradationLevel::PureGeneration);
    assert_monotonic(&outcome);
}

#[tokio::test]
async fn missing_backends_are_fatal() {
    let result = EngineBuilder::new(EngineConfig::default()).build();
    assert!(matches!(result, Err(OrchestrationError::Configuration(_))));

    let mut config = EngineConfig::default();
    config.strategies.grep = false;
    config.strategies.files_via_metadata = false;
    config.strategies.files_via_content = false;
    let result = EngineBuilder::new(config)
        .filesystem_search(Arc::new(ragroute_retrieval::InMemoryIndex::new(Vec::new())))
        .build();
    assert!(matches!(result, Err(OrchestrationError::Configuration(_))));
}
