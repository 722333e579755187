use crate::error::RetrievalError;
use crate::text::normalize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of retrieval strategies.
///
/// The declaration order is also the order in which the merger visits
/// strategies, so it doubles as the final tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    /// Semantic similarity over embeddings
    Vector,
    /// Lexical BM25 ranking
    Bm25,
    /// Vector + BM25 fused internally
    Hybrid,
    /// Regex/substring scan over raw text
    Grep,
    /// Filename and path matching
    FilesViaMetadata,
    /// Whole-file relevance
    FilesViaContent,
}

impl StrategyId {
    pub const ALL: [StrategyId; 6] = [
        StrategyId::Vector,
        StrategyId::Bm25,
        StrategyId::Hybrid,
        StrategyId::Grep,
        StrategyId::FilesViaMetadata,
        StrategyId::FilesViaContent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyId::Vector => "vector",
            StrategyId::Bm25 => "bm25",
            StrategyId::Hybrid => "hybrid",
            StrategyId::Grep => "grep",
            StrategyId::FilesViaMetadata => "files_via_metadata",
            StrategyId::FilesViaContent => "files_via_content",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StrategyId::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| RetrievalError::UnknownStrategy(s.to_string()))
    }
}

/// An incoming question. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    max_results: usize,
    #[serde(default)]
    filters: BTreeMap<String, String>,
}

impl Query {
    pub const DEFAULT_MAX_RESULTS: usize = 10;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_results: Self::DEFAULT_MAX_RESULTS,
            filters: BTreeMap::new(),
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Require `metadata[key] == value` on every returned node.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    /// Same query with different text, used when a tool call rewrites the query.
    pub fn rewritten(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_results: self.max_results,
            filters: self.filters.clone(),
        }
    }

    pub fn accepts(&self, node: &ScoredNode) -> bool {
        self.filters.iter().all(|(key, expected)| {
            match node.metadata.get(key) {
                Some(Value::String(actual)) => actual == expected,
                Some(other) => other.to_string() == *expected,
                None => false,
            }
        })
    }
}

/// A candidate passage returned by one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    /// Stable identifier; when absent the normalized text hash stands in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Passage text
    pub text: String,

    /// Strategy-local score, not comparable across strategies
    pub score: f64,

    /// Strategy that produced this node
    pub source: StrategyId,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ScoredNode {
    pub fn new(id: Option<String>, text: impl Into<String>, score: f64, source: StrategyId) -> Self {
        Self {
            id,
            text: text.into(),
            score,
            source,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// File path recorded by the backend, if any.
    pub fn path(&self) -> Option<&str> {
        self.metadata.get("path").and_then(Value::as_str)
    }

    /// Identity used for deduplication across strategies.
    pub fn dedup_key(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => format!("id:{id}"),
            _ => {
                let digest = Sha256::digest(normalize(&self.text).as_bytes());
                format!("sha256:{digest:x}")
            }
        }
    }
}

/// Nodes in rank order (rank 1 = position 0) with non-increasing scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedList(Vec<ScoredNode>);

impl RankedList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Order nodes by descending score. Equal scores keep their incoming order,
    /// NaN sorts last.
    pub fn from_scored(mut nodes: Vec<ScoredNode>) -> Self {
        for node in &mut nodes {
            if node.score.is_nan() {
                node.score = f64::MIN;
            }
        }
        nodes.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self(nodes)
    }

    pub fn nodes(&self) -> &[ScoredNode] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredNode> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Append nodes not already present (by dedup key), then restore ordering.
    pub fn extend_unique(&mut self, other: RankedList) {
        let mut nodes = std::mem::take(&mut self.0);
        for node in other.0 {
            let key = node.dedup_key();
            if !nodes.iter().any(|existing| existing.dedup_key() == key) {
                nodes.push(node);
            }
        }
        *self = Self::from_scored(nodes);
    }

    pub fn into_nodes(self) -> Vec<ScoredNode> {
        self.0
    }
}

impl<'a> IntoIterator for &'a RankedList {
    type Item = &'a ScoredNode;
    type IntoIter = std::slice::Iter<'a, ScoredNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A deduplicated node after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub node: ScoredNode,

    /// Sum of weighted reciprocal-rank contributions
    pub fused_score: f64,

    /// Strategies whose lists contained this node, in visit order
    pub contributing_strategies: Vec<StrategyId>,

    /// Best (lowest, 1-based) rank across contributing lists
    pub best_rank: usize,

    /// Score assigned by the reranker, when one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
}

impl FusedResult {
    /// Single-source result used when fusion is skipped.
    pub fn from_ranked(list: &RankedList) -> Vec<FusedResult> {
        list.iter()
            .enumerate()
            .map(|(position, node)| FusedResult {
                node: node.clone(),
                fused_score: node.score,
                contributing_strategies: vec![node.source],
                best_rank: position + 1,
                rerank_score: None,
            })
            .collect()
    }

    /// Re-express a fused result as a node of `source`, keeping provenance in metadata.
    pub fn into_node(self, source: StrategyId) -> ScoredNode {
        let fused_from: Vec<Value> = self
            .contributing_strategies
            .iter()
            .map(|strategy| Value::from(strategy.as_str()))
            .collect();
        let mut node = self.node;
        node.score = self.rerank_score.unwrap_or(self.fused_score);
        node.source = source;
        node.metadata
            .insert("fused_from".to_string(), Value::Array(fused_from));
        node
    }
}
