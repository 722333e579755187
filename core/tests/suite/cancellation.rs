use crate::common::{BrokenBackend, COMPLEX_QUERY, SIMPLE_QUERY, builder};
use ragroute_core::{EngineBuilder, EngineConfig, OrchestrationError, Query};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn stalled_engine() -> ragroute_core::OrchestrationEngine {
    let stalled = BrokenBackend::stalled(Duration::from_secs(30));
    EngineBuilder::new(EngineConfig::default())
        .vector_search(stalled.clone())
        .keyword_search(stalled.clone())
        .filesystem_search(stalled)
        .build()
        .unwrap()
}

#[tokio::test]
async fn cancel_mid_fan_out_returns_promptly() {
    let engine = stalled_engine();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let cancelled_at = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
        Instant::now()
    });

    let result = engine
        .query_with(Query::new(COMPLEX_QUERY), cancel)
        .await;
    let returned_at = Instant::now();
    let cancelled_at = cancelled_at.await.unwrap();

    assert!(matches!(result, Err(OrchestrationError::Cancelled)));
    assert!(
        returned_at.saturating_duration_since(cancelled_at) < Duration::from_millis(50),
        "returned {:?} after cancellation",
        returned_at.saturating_duration_since(cancelled_at)
    );
}

#[tokio::test]
async fn already_cancelled_token_short_circuits() {
    let engine = stalled_engine();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = engine.query_with(Query::new(SIMPLE_QUERY), cancel).await;
    assert!(matches!(result, Err(OrchestrationError::Cancelled)));
}

#[tokio::test]
async fn cancel_during_agent_llm_call() {
    struct SlowChat;

    #[async_trait::async_trait]
    impl ragroute_core::ChatModel for SlowChat {
        async fn chat(
            &self,
            _messages: &[ragroute_agent::Message],
        ) -> Result<ragroute_agent::Completion, ragroute_agent::ChatError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ragroute_agent::Completion::text("{}"))
        }
    }

    let engine = builder(EngineConfig::default())
        .chat_model(std::sync::Arc::new(SlowChat))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = engine.query_with(Query::new(COMPLEX_QUERY), cancel).await;

    assert!(matches!(result, Err(OrchestrationError::Cancelled)));
    assert!(started.elapsed() < Duration::from_millis(500));
}
