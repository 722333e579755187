use crate::config::RerankConfig;
use crate::error::{BackendError, Result, RetrievalError};
use crate::result::{FusedResult, Query};
use crate::text::{normalize, path_tokens, quoted_phrase, significant_terms};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Relevance model used by the rerank stage (typically a cross-encoder service).
#[async_trait]
pub trait ScoreModel: Send + Sync {
    /// One score per passage, in input order. Higher is more relevant.
    async fn score(&self, query: &str, passages: &[String]) -> std::result::Result<Vec<f64>, BackendError>;
}

/// Reorders fused results by a [`ScoreModel`] and keeps the best `top_n`.
pub struct Reranker {
    model: Arc<dyn ScoreModel>,
    batch_size: usize,
}

impl Reranker {
    pub fn new(model: Arc<dyn ScoreModel>, batch_size: usize) -> Self {
        Self {
            model,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(model: Arc<dyn ScoreModel>, config: &RerankConfig) -> Self {
        Self::new(model, config.batch_size)
    }

    /// Score every result, sort by the new score (stable on ties) and truncate.
    ///
    /// Cancellation and deadlines are left to the caller; dropping the
    /// returned future abandons in-flight batches.
    pub async fn rerank(
        &self,
        query: &Query,
        results: Vec<FusedResult>,
        top_n: usize,
    ) -> Result<Vec<FusedResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        let passages: Vec<String> = results.iter().map(|r| r.node.text.clone()).collect();
        let mut scores = Vec::with_capacity(passages.len());
        for batch in passages.chunks(self.batch_size) {
            let batch_scores = self
                .model
                .score(query.text(), batch)
                .await
                .map_err(|err| RetrievalError::Reranking(err.to_string()))?;
            if batch_scores.len() != batch.len() {
                return Err(RetrievalError::Reranking(format!(
                    "score model returned {} scores for {} passages",
                    batch_scores.len(),
                    batch.len()
                )));
            }
            scores.extend(batch_scores);
        }

        let mut reranked: Vec<FusedResult> = results
            .into_iter()
            .zip(scores)
            .map(|(mut result, score)| {
                result.rerank_score = Some(if score.is_nan() { f64::MIN } else { score });
                result
            })
            .collect();

        reranked.sort_by(|a, b| {
            let a = a.rerank_score.unwrap_or(f64::MIN);
            let b = b.rerank_score.unwrap_or(f64::MIN);
            b.total_cmp(&a)
        });
        reranked.truncate(top_n);

        debug!("Reranked to {} results", reranked.len());
        Ok(reranked)
    }
}

/// Cheap local relevance model: term coverage, exact phrase and path mentions.
///
/// Used when no remote rerank service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalScoreModel;

impl LexicalScoreModel {
    pub fn score_one(query: &str, passage: &str) -> f64 {
        let terms = significant_terms(query);
        let haystack = normalize(passage);

        let coverage = if terms.is_empty() {
            0.0
        } else {
            let hits = terms.iter().filter(|term| haystack.contains(term.as_str())).count();
            hits as f64 / terms.len() as f64
        };

        let phrase = quoted_phrase(query)
            .map(normalize)
            .unwrap_or_else(|| normalize(query));
        let exact = if !phrase.is_empty() && haystack.contains(&phrase) {
            1.0
        } else {
            0.0
        };

        let paths = path_tokens(query);
        let path_hit = if paths.iter().any(|p| haystack.contains(&p.to_lowercase())) {
            1.0
        } else {
            0.0
        };

        (coverage * 0.6 + exact * 0.25 + path_hit * 0.15) * size_factor(passage)
    }
}

/// Very short and very long passages are less useful as answers.
fn size_factor(passage: &str) -> f64 {
    let trimmed = passage.trim();
    if trimmed.chars().count() < 20 {
        0.9
    } else if trimmed.lines().count() > 200 {
        0.85
    } else {
        1.0
    }
}

#[async_trait]
impl ScoreModel for LexicalScoreModel {
    async fn score(&self, query: &str, passages: &[String]) -> std::result::Result<Vec<f64>, BackendError> {
        Ok(passages
            .iter()
            .map(|passage| Self::score_one(query, passage))
            .collect())
    }
}
