use crate::backend::{FileSystemSearch, SearchScope};
use crate::error::{Result, RetrievalError};
use crate::result::{Query, RankedList, StrategyId};
use crate::retriever::{Retriever, require_text, run_backend};
use crate::text::{quoted_phrase, significant_terms};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Case-insensitive literal scan over raw text lines.
pub struct GrepRetriever {
    backend: Arc<dyn FileSystemSearch>,
}

impl GrepRetriever {
    pub fn new(backend: Arc<dyn FileSystemSearch>) -> Self {
        Self { backend }
    }

    /// Regex for `text`: a quoted phrase verbatim, otherwise any significant term.
    pub fn pattern_for(text: &str) -> Option<String> {
        if let Some(phrase) = quoted_phrase(text) {
            return Some(format!("(?i){}", regex_lite::escape(phrase)));
        }

        let terms = significant_terms(text);
        if terms.is_empty() {
            return None;
        }
        let alternatives: Vec<String> = terms.iter().map(|t| regex_lite::escape(t)).collect();
        Some(format!("(?i)(?:{})", alternatives.join("|")))
    }
}

#[async_trait]
impl Retriever for GrepRetriever {
    fn strategy(&self) -> StrategyId {
        StrategyId::Grep
    }

    fn description(&self) -> &'static str {
        "Line-level text scan; best for quoted phrases and literal strings"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedList> {
        require_text(StrategyId::Grep, query)?;
        let pattern = Self::pattern_for(query.text()).ok_or_else(|| RetrievalError::InvalidQuery {
            strategy: StrategyId::Grep,
            reason: "no searchable terms".to_string(),
        })?;

        run_backend(
            StrategyId::Grep,
            query,
            top_k,
            cancel,
            self.backend.search(&pattern, SearchScope::Lines, top_k),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::CannedBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pattern_prefers_quoted_phrase() {
        assert_eq!(
            GrepRetriever::pattern_for("where is \"max.retries\" set?"),
            Some(r"(?i)max\.retries".to_string())
        );
    }

    #[test]
    fn test_pattern_alternates_terms() {
        assert_eq!(
            GrepRetriever::pattern_for("how is the retry budget enforced"),
            Some("(?i)(?:retry|budget|enforced)".to_string())
        );
        assert_eq!(GrepRetriever::pattern_for("how is it"), None);
    }

    #[tokio::test]
    async fn test_grep_searches_lines() {
        let backend = Arc::new(CannedBackend::with_ids(&["a"]));
        let retriever = GrepRetriever::new(backend.clone());
        let list = retriever
            .retrieve(&Query::new("`connect_timeout`"), 5, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(
            backend.seen(),
            vec![("(?i)connect_timeout".to_string(), Some(SearchScope::Lines))]
        );
    }
}
