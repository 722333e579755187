use pretty_assertions::assert_eq;
use ragroute_agent::{ChatError, ChatModel, Message};
use ragroute_providers::{
    ChatProviderConfig, HttpScoreModel, OpenAiChatModel, RerankProviderConfig,
};
use ragroute_retrieval::{BackendError, ScoreModel};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_config(server: &MockServer, timeout_ms: u64) -> ChatProviderConfig {
    ChatProviderConfig {
        base_url: format!("{}/v1", server.uri()),
        model: "planner-small".to_string(),
        api_key_env: None,
        timeout_ms,
        temperature: Some(0.0),
    }
}

fn rerank_config(server: &MockServer) -> RerankProviderConfig {
    RerankProviderConfig {
        base_url: server.uri(),
        model: "bge-reranker".to_string(),
        path: "/rerank".to_string(),
        api_key_env: None,
        timeout_ms: 2_000,
    }
}

#[tokio::test]
async fn chat_completion_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "planner-small",
            "messages": [
                { "role": "system", "content": "plan" },
                { "role": "user", "content": "where is retry configured?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"action\":\"final\"}" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new(chat_config(&server, 2_000))
        .unwrap()
        .with_api_key("sk-test");
    let completion = model
        .chat(&[
            Message::system("plan"),
            Message::user("where is retry configured?"),
        ])
        .await
        .unwrap();

    assert_eq!(completion.content, r#"{"action":"final"}"#);
    assert_eq!(completion.usage.map(|u| u.prompt_tokens), Some(12));
}

#[tokio::test]
async fn chat_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new(chat_config(&server, 2_000)).unwrap();
    let err = model.chat(&[Message::user("hi")]).await.unwrap_err();

    assert!(matches!(err, ChatError::Unavailable(ref message) if message.contains("503")));
}

#[tokio::test]
async fn chat_without_choices_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new(chat_config(&server, 2_000)).unwrap();
    let err = model.chat(&[Message::user("hi")]).await.unwrap_err();

    assert!(matches!(err, ChatError::InvalidResponse(_)));
}

#[tokio::test]
async fn slow_chat_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({ "choices": [] })),
        )
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new(chat_config(&server, 50)).unwrap();
    let err = model.chat(&[Message::user("hi")]).await.unwrap_err();

    assert_eq!(err, ChatError::Timeout(50));
}

#[tokio::test]
async fn rerank_scores_follow_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rerank"))
        .and(body_partial_json(json!({
            "model": "bge-reranker",
            "query": "retry policy",
            "documents": ["logging setup", "retry policy doubles delays"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "index": 1, "relevance_score": 0.93 },
                { "index": 0, "relevance_score": 0.08 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = HttpScoreModel::new(rerank_config(&server)).unwrap();
    let scores = model
        .score(
            "retry policy",
            &["logging setup".to_string(), "retry policy doubles delays".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(scores, vec![0.08, 0.93]);
}

#[tokio::test]
async fn rerank_failure_maps_to_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let model = HttpScoreModel::new(rerank_config(&server)).unwrap();
    let err = model
        .score("q", &["passage".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Unavailable(_)));
}

#[tokio::test]
async fn rerank_skips_request_for_empty_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let model = HttpScoreModel::new(rerank_config(&server)).unwrap();
    assert_eq!(model.score("q", &[]).await.unwrap(), Vec::<f64>::new());
}
