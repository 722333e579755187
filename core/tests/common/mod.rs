#![allow(dead_code)]

use async_trait::async_trait;
use ragroute_agent::{ChatError, ChatModel, Completion, Message};
use ragroute_core::{EngineBuilder, EngineConfig};
use ragroute_retrieval::{
    BackendError, FileSystemSearch, InMemoryIndex, IndexedDocument, KeywordSearch, ScoreModel,
    ScoredNode, SearchScope, VectorSearch,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Simple query routed to `vector`.
pub const SIMPLE_QUERY: &str = "how does the retry policy work";

/// Two conjunctions and enough words to clear the default complexity threshold.
pub const COMPLEX_QUERY: &str = "how does the retry policy work and how is backoff configured \
                                 and where are connection limits set";

pub const CALL_VECTOR: &str =
    r#"{"action":"call_tool","thought":"semantic pass","tool":"vector","arguments":{"query":"retry backoff"}}"#;
pub const CALL_BM25: &str =
    r#"{"action":"call_tool","tool":"bm25","arguments":{"query":"connection pool limits"}}"#;
pub const FINAL: &str = r#"{"action":"final","thought":"enough context"}"#;

pub fn corpus() -> Arc<InMemoryIndex> {
    Arc::new(InMemoryIndex::new(vec![
        IndexedDocument::new(
            "readme",
            Some("README.md"),
            "ragroute answers questions over a document index. See docs/config.md for settings.",
        ),
        IndexedDocument::new(
            "retry",
            Some("docs/retry.md"),
            "The retry policy uses exponential backoff starting at 100ms and doubling up to five attempts.",
        ),
        IndexedDocument::new(
            "backoff",
            Some("src/backoff.rs"),
            "Backoff is configured with base_delay and max_delay; jitter spreads retry attempts.",
        ),
        IndexedDocument::new(
            "pool",
            Some("docs/pool.md"),
            "Connection limits are set per host; the pool keeps at most 32 idle connections.",
        ),
        IndexedDocument::new(
            "auth",
            Some("docs/auth.md"),
            "Tokens are refreshed five minutes before expiry.",
        ),
    ]))
}

pub fn builder(config: EngineConfig) -> EngineBuilder {
    EngineBuilder::new(config).in_memory(corpus())
}

/// Replays canned replies and repeats the last one when the script runs out.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, ChatError>>>,
    last: Mutex<Option<Result<String, ChatError>>>,
    calls: AtomicU32,
}

impl ScriptedChat {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Self::with_results(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn failing() -> Arc<Self> {
        Self::with_results(vec![Err(ChatError::Unavailable("connection refused".to_string()))])
    }

    fn with_results(replies: Vec<Result<String, ChatError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(&self, _messages: &[Message]) -> Result<Completion, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(FINAL.to_string())),
        };
        reply.map(Completion::text)
    }
}

/// Backend that fails every call, or stalls for `delay` first.
pub struct BrokenBackend {
    delay: Option<Duration>,
}

impl BrokenBackend {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self { delay: None })
    }

    pub fn stalled(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay: Some(delay) })
    }

    async fn respond(&self) -> Result<Vec<ScoredNode>, BackendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Err(BackendError::Unavailable("index offline".to_string()))
    }
}

#[async_trait]
impl VectorSearch for BrokenBackend {
    async fn search(&self, _text: &str, _top_k: usize) -> Result<Vec<ScoredNode>, BackendError> {
        self.respond().await
    }
}

#[async_trait]
impl KeywordSearch for BrokenBackend {
    async fn search(&self, _text: &str, _top_k: usize) -> Result<Vec<ScoredNode>, BackendError> {
        self.respond().await
    }
}

#[async_trait]
impl FileSystemSearch for BrokenBackend {
    async fn search(
        &self,
        _pattern: &str,
        _scope: SearchScope,
        _top_k: usize,
    ) -> Result<Vec<ScoredNode>, BackendError> {
        self.respond().await
    }
}

/// Score model that always errors.
pub struct BrokenScoreModel;

#[async_trait]
impl ScoreModel for BrokenScoreModel {
    async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f64>, BackendError> {
        Err(BackendError::Unavailable("reranker offline".to_string()))
    }
}

/// Score model that prefers shorter passages, to make reordering visible.
pub struct ShortestFirst;

#[async_trait]
impl ScoreModel for ShortestFirst {
    async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f64>, BackendError> {
        Ok(passages.iter().map(|p| 1.0 / (1.0 + p.len() as f64)).collect())
    }
}
