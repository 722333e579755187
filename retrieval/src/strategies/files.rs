use crate::backend::{FileSystemSearch, SearchScope};
use crate::error::{Result, RetrievalError};
use crate::result::{Query, RankedList, ScoredNode, StrategyId};
use crate::retriever::{Retriever, require_text, run_backend, stamp};
use crate::text::{path_tokens, significant_terms};
use async_trait::async_trait;
use log::debug;
use ragroute_async_utils::OrCancelExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const MAX_PATH_LOOKUPS: usize = 4;

/// Finds files by name or path.
pub struct FilesViaMetadataRetriever {
    backend: Arc<dyn FileSystemSearch>,
}

impl FilesViaMetadataRetriever {
    pub fn new(backend: Arc<dyn FileSystemSearch>) -> Self {
        Self { backend }
    }

    fn patterns(text: &str) -> Vec<String> {
        let mut patterns = path_tokens(text);
        patterns.truncate(MAX_PATH_LOOKUPS);
        if patterns.is_empty() {
            let terms = significant_terms(text);
            if !terms.is_empty() {
                patterns.push(terms.join(" "));
            }
        }
        patterns
    }
}

#[async_trait]
impl Retriever for FilesViaMetadataRetriever {
    fn strategy(&self) -> StrategyId {
        StrategyId::FilesViaMetadata
    }

    fn description(&self) -> &'static str {
        "Match file names and paths; best when the question names a file"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedList> {
        const STRATEGY: StrategyId = StrategyId::FilesViaMetadata;
        require_text(STRATEGY, query)?;

        let patterns = Self::patterns(query.text());
        if patterns.is_empty() {
            return Err(RetrievalError::InvalidQuery {
                strategy: STRATEGY,
                reason: "no file name or searchable terms".to_string(),
            });
        }

        // Several path tokens: keep each file once, at its best score.
        let mut merged: Vec<ScoredNode> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for pattern in &patterns {
            let nodes = self
                .backend
                .search(pattern, SearchScope::FileNames, top_k)
                .or_cancel(cancel)
                .await
                .map_err(|_| RetrievalError::Cancelled { strategy: STRATEGY })?
                .map_err(|err| RetrievalError::Backend {
                    strategy: STRATEGY,
                    message: err.to_string(),
                })?;

            for node in nodes {
                let key = node.dedup_key();
                match positions.get(&key) {
                    Some(&index) if merged[index].score < node.score => merged[index] = node,
                    Some(_) => {}
                    None => {
                        positions.insert(key, merged.len());
                        merged.push(node);
                    }
                }
            }
        }

        debug!(
            "files_via_metadata looked up {} pattern(s), {} file(s) matched",
            patterns.len(),
            merged.len()
        );
        Ok(stamp(STRATEGY, query, merged, top_k))
    }
}

/// Ranks whole files by how much of the question their content covers.
pub struct FilesViaContentRetriever {
    backend: Arc<dyn FileSystemSearch>,
}

impl FilesViaContentRetriever {
    pub fn new(backend: Arc<dyn FileSystemSearch>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Retriever for FilesViaContentRetriever {
    fn strategy(&self) -> StrategyId {
        StrategyId::FilesViaContent
    }

    fn description(&self) -> &'static str {
        "Rank entire files by content relevance; best for broad 'which files' questions"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedList> {
        require_text(StrategyId::FilesViaContent, query)?;
        run_backend(
            StrategyId::FilesViaContent,
            query,
            top_k,
            cancel,
            self.backend
                .search(query.text(), SearchScope::FileContents, top_k),
        )
        .await
    }
}
