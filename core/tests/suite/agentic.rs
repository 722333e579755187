use crate::common::{CALL_BM25, CALL_VECTOR, COMPLEX_QUERY, FINAL, ScriptedChat, builder};
use pretty_assertions::assert_eq;
use ragroute_agent::StopReason;
use ragroute_core::{AgentState, DegradationLevel, EngineConfig, RoutingMode, StrategyId};

#[test_log::test(tokio::test)]
async fn agent_collects_from_several_tools_and_fuses() {
    let chat = ScriptedChat::new(&[CALL_VECTOR, CALL_BM25, FINAL]);
    let engine = builder(EngineConfig::default())
        .chat_model(chat.clone())
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    assert_eq!(outcome.routing.mode, RoutingMode::Agentic);
    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert_eq!(chat.calls(), 3);
    assert_eq!(outcome.stats.llm_calls, 3);

    let trace = outcome.trace.as_ref().unwrap();
    assert_eq!(trace.outcome(), Some(AgentState::Finalize));
    assert_eq!(trace.stop_reason(), Some(&StopReason::FinalAnswer));
    assert_eq!(trace.count(AgentState::ToolExecution), 2);

    let sources = outcome.sources();
    assert!(sources.contains(&"retry".to_string()));
    assert!(sources.contains(&"pool".to_string()));
    let strategies: Vec<StrategyId> = outcome
        .results
        .iter()
        .flat_map(|r| r.contributing_strategies.iter().copied())
        .collect();
    assert!(strategies.contains(&StrategyId::Vector));
    assert!(strategies.contains(&StrategyId::Bm25));
}

#[tokio::test]
async fn iteration_limit_finalizes_with_collected_results() {
    let mut config = EngineConfig::default();
    config.agent.max_iterations = 2;
    let chat = ScriptedChat::new(&[CALL_VECTOR]);
    let engine = builder(config).chat_model(chat.clone()).build().unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    let trace = outcome.trace.as_ref().unwrap();
    assert_eq!(chat.calls(), 2);
    assert_eq!(trace.count(AgentState::ToolExecution), 2);
    assert_eq!(trace.outcome(), Some(AgentState::Finalize));
    assert_eq!(
        trace.stop_reason(),
        Some(&StopReason::IterationLimit { max_iterations: 2 })
    );
    assert_eq!(outcome.degraded_to, DegradationLevel::None);
    assert!(!outcome.results.is_empty());
}

#[tokio::test]
async fn llm_call_budget_is_never_exceeded() {
    let mut config = EngineConfig::default();
    config.agent.max_iterations = 5;
    config.agent.max_llm_calls = 3;
    let chat = ScriptedChat::new(&[CALL_VECTOR; 5]);
    let engine = builder(config).chat_model(chat.clone()).build().unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    let trace = outcome.trace.as_ref().unwrap();
    assert_eq!(chat.calls(), 3);
    assert_eq!(outcome.stats.llm_calls, 3);
    assert!(trace.count(AgentState::Planning) <= 3);
    assert!(matches!(
        trace.stop_reason(),
        Some(StopReason::Budget { .. })
    ));
    let budget = outcome.stats.budget.unwrap();
    assert_eq!(budget.used_llm_calls, 3);
    assert_eq!(budget.max_llm_calls, 3);
}

#[tokio::test]
async fn unknown_tool_does_not_stop_the_agent() {
    let chat = ScriptedChat::new(&[
        r#"{"action":"call_tool","tool":"web_search","arguments":{"q":"retry"}}"#,
        CALL_VECTOR,
        FINAL,
    ]);
    let engine = builder(EngineConfig::default())
        .chat_model(chat)
        .build()
        .unwrap();

    let outcome = engine.query(COMPLEX_QUERY).await.unwrap();

    let trace = outcome.trace.as_ref().unwrap();
    assert_eq!(trace.count(AgentState::ToolSelection), 1);
    assert_eq!(trace.outcome(), Some(AgentState::Finalize));
    assert_eq!(outcome.degraded_to, DegradationLevel::None);
}

#[tokio::test]
async fn agent_catalogue_lists_enabled_strategies_and_rerank() {
    let engine = builder(EngineConfig::default())
        .chat_model(ScriptedChat::new(&[FINAL]))
        .build()
        .unwrap();

    let names: Vec<String> = engine
        .tools()
        .list_tools()
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "vector",
            "bm25",
            "hybrid",
            "grep",
            "files_via_metadata",
            "files_via_content",
            "rerank"
        ]
    );
}
