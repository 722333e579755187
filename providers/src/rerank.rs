use crate::config::{RerankProviderConfig, api_key, endpoint};
use crate::error::{ProviderError, Result};
use crate::http;
use async_trait::async_trait;
use ragroute_retrieval::{BackendError, ScoreModel};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

/// [`ScoreModel`] backed by a `/rerank` service.
pub struct HttpScoreModel {
    http: reqwest::Client,
    config: RerankProviderConfig,
    api_key: Option<String>,
}

impl HttpScoreModel {
    pub fn new(config: RerankProviderConfig) -> Result<Self> {
        config.validate()?;
        let api_key = api_key(config.api_key_env.as_deref())?;
        Ok(Self {
            http: http::client(config.timeout())?,
            config,
            api_key,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f64>> {
        let url = endpoint(&self.config.base_url, &self.config.path);
        let request = RerankRequest {
            model: &self.config.model,
            query,
            documents: passages,
        };
        let json: Value = http::post_json(
            &self.http,
            &url,
            self.api_key.as_deref(),
            &request,
            self.config.timeout(),
        )
        .await?;
        parse_rerank_response(&json, passages.len())
    }
}

#[async_trait]
impl ScoreModel for HttpScoreModel {
    async fn score(
        &self,
        query: &str,
        passages: &[String],
    ) -> std::result::Result<Vec<f64>, BackendError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        self.rerank(query, passages).await.map_err(BackendError::from)
    }
}

/// Scores aligned to input order. Passages the service leaves out score 0.
fn parse_rerank_response(json: &Value, doc_count: usize) -> Result<Vec<f64>> {
    let mut scores = vec![0.0; doc_count];
    let results = json
        .get("results")
        .or_else(|| json.get("data"))
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing results array".to_string()))?;

    for item in results {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|index| usize::try_from(index).ok())
            .ok_or_else(|| ProviderError::InvalidResponse("result missing index".to_string()))?;
        let score = item
            .get("relevance_score")
            .or_else(|| item.get("score"))
            .and_then(Value::as_f64)
            .ok_or_else(|| ProviderError::InvalidResponse("result missing score".to_string()))?;
        if let Some(slot) = scores.get_mut(index) {
            *slot = score;
        }
    }

    Ok(scores)
}
