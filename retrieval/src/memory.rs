//! In-process search backends over a fixed document set.
//!
//! [`InMemoryIndex`] implements every backend contract so the engine can run
//! without external services: the CLI loads a JSON corpus into it, and the
//! integration tests use it as a realistic fixture.

use crate::backend::{FileSystemSearch, KeywordSearch, SearchScope, VectorSearch};
use crate::error::BackendError;
use crate::result::{ScoredNode, StrategyId};
use crate::text::{content_tokens, significant_terms};
use async_trait::async_trait;
use bm25::{Document as Bm25Document, Language, SearchEngine, SearchEngineBuilder};
use log::debug;
use nucleo_matcher::{Config, Matcher, Utf32Str};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A passage loaded into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,

    /// Source file, when the passage came from one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub text: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl IndexedDocument {
    pub fn new(id: impl Into<String>, path: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.map(str::to_string),
            text: text.into(),
            metadata: Map::new(),
        }
    }

    fn to_node(&self, id: String, text: String, score: f64, source: StrategyId) -> ScoredNode {
        let mut node = ScoredNode::new(Some(id), text, score, source);
        node.metadata = self.metadata.clone();
        if let Some(path) = &self.path {
            node.metadata
                .insert("path".to_string(), Value::String(path.clone()));
        }
        node
    }
}

type TermVector = BTreeMap<String, f64>;

/// Term-vector, BM25, regex and path search over documents held in memory.
pub struct InMemoryIndex {
    documents: Vec<IndexedDocument>,
    vectors: Vec<TermVector>,
    keyword: SearchEngine<u64>,
}

impl InMemoryIndex {
    pub fn new(documents: Vec<IndexedDocument>) -> Self {
        let vectors = documents.iter().map(|doc| term_vector(&doc.text)).collect();
        let corpus: Vec<Bm25Document<u64>> = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| Bm25Document {
                id: index as u64,
                contents: doc.text.clone(),
            })
            .collect();
        let keyword = SearchEngineBuilder::<u64>::with_documents(Language::English, corpus).build();

        debug!("Indexed {} documents in memory", documents.len());
        Self {
            documents,
            vectors,
            keyword,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[IndexedDocument] {
        &self.documents
    }

    fn search_lines(&self, pattern: &str, top_k: usize) -> Result<Vec<ScoredNode>, BackendError> {
        let regex = Regex::new(pattern)
            .map_err(|err| BackendError::InvalidRequest(format!("bad pattern {pattern:?}: {err}")))?;

        let mut nodes = Vec::new();
        for doc in &self.documents {
            for (line_no, line) in doc.text.lines().enumerate() {
                let hits = regex.find_iter(line).count();
                if hits == 0 {
                    continue;
                }
                let mut node = doc.to_node(
                    format!("{}:{}", doc.id, line_no + 1),
                    line.trim().to_string(),
                    hits as f64,
                    StrategyId::Grep,
                );
                node.metadata
                    .insert("line".to_string(), Value::from(line_no + 1));
                nodes.push(node);
            }
        }
        Ok(top(nodes, top_k))
    }

    fn search_file_names(&self, pattern: &str, top_k: usize) -> Vec<ScoredNode> {
        let mut matcher = Matcher::new(Config::DEFAULT.match_paths());
        // Case folding only applies to the haystack side.
        let pattern = pattern.to_lowercase();
        let mut needle_buf = Vec::new();
        let needle = Utf32Str::new(&pattern, &mut needle_buf);

        let mut nodes = Vec::new();
        for (path, docs) in self.files() {
            let mut haystack_buf = Vec::new();
            let haystack = Utf32Str::new(path, &mut haystack_buf);
            let Some(score) = matcher.fuzzy_match(haystack, needle) else {
                continue;
            };
            nodes.push(file_node(path, &docs, score as f64 / 1000.0, StrategyId::FilesViaMetadata));
        }
        top(nodes, top_k)
    }

    fn search_file_contents(&self, pattern: &str, top_k: usize) -> Vec<ScoredNode> {
        let terms = significant_terms(pattern);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut nodes = Vec::new();
        for (path, docs) in self.files() {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for doc in &docs {
                for token in content_tokens(&doc.text) {
                    *counts.entry(token).or_default() += 1;
                }
            }
            let matched = terms.iter().filter(|t| counts.contains_key(*t)).count();
            if matched == 0 {
                continue;
            }
            let occurrences: usize = terms.iter().filter_map(|t| counts.get(t)).sum();
            let coverage = matched as f64 / terms.len() as f64;
            let score = coverage + (1.0 + occurrences as f64).ln() / 100.0;
            nodes.push(file_node(path, &docs, score, StrategyId::FilesViaContent));
        }
        top(nodes, top_k)
    }

    /// Documents grouped by path, in first-seen order.
    fn files(&self) -> Vec<(&str, Vec<&IndexedDocument>)> {
        let mut files: Vec<(&str, Vec<&IndexedDocument>)> = Vec::new();
        for doc in &self.documents {
            let Some(path) = doc.path.as_deref() else {
                continue;
            };
            match files.iter_mut().find(|(p, _)| *p == path) {
                Some((_, docs)) => docs.push(doc),
                None => files.push((path, vec![doc])),
            }
        }
        files
    }
}

fn file_node(path: &str, docs: &[&IndexedDocument], score: f64, source: StrategyId) -> ScoredNode {
    let text = docs
        .iter()
        .map(|doc| doc.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let mut node = ScoredNode::new(Some(format!("file:{path}")), text, score, source);
    node.metadata = shared_metadata(docs);
    node.with_metadata("path", path)
        .with_metadata("chunks", docs.len())
}

/// Metadata entries every chunk of a file agrees on.
fn shared_metadata(docs: &[&IndexedDocument]) -> Map<String, Value> {
    let Some((first, rest)) = docs.split_first() else {
        return Map::new();
    };
    first
        .metadata
        .iter()
        .filter(|(key, value)| rest.iter().all(|doc| doc.metadata.get(*key) == Some(*value)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn term_vector(text: &str) -> TermVector {
    let mut vector = TermVector::new();
    for token in content_tokens(text) {
        *vector.entry(token).or_default() += 1.0;
    }
    let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in vector.values_mut() {
            *value /= norm;
        }
    }
    vector
}

fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    a.iter()
        .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
        .sum()
}

fn top(mut nodes: Vec<ScoredNode>, top_k: usize) -> Vec<ScoredNode> {
    nodes.sort_by(|a, b| b.score.total_cmp(&a.score));
    nodes.truncate(top_k);
    nodes
}

#[async_trait]
impl VectorSearch for InMemoryIndex {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<ScoredNode>, BackendError> {
        let query = term_vector(text);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let nodes = self
            .documents
            .iter()
            .zip(&self.vectors)
            .filter_map(|(doc, vector)| {
                let similarity = cosine(&query, vector);
                (similarity > 0.0).then(|| {
                    doc.to_node(doc.id.clone(), doc.text.clone(), similarity, StrategyId::Vector)
                })
            })
            .collect();
        Ok(top(nodes, top_k))
    }
}

#[async_trait]
impl KeywordSearch for InMemoryIndex {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<ScoredNode>, BackendError> {
        let nodes = self
            .keyword
            .search(text, top_k)
            .into_iter()
            .filter_map(|hit| {
                let doc = self.documents.get(hit.document.id as usize)?;
                Some(doc.to_node(
                    doc.id.clone(),
                    doc.text.clone(),
                    f64::from(hit.score),
                    StrategyId::Bm25,
                ))
            })
            .collect();
        Ok(top(nodes, top_k))
    }
}

#[async_trait]
impl FileSystemSearch for InMemoryIndex {
    async fn search(
        &self,
        pattern: &str,
        scope: SearchScope,
        top_k: usize,
    ) -> Result<Vec<ScoredNode>, BackendError> {
        if pattern.trim().is_empty() {
            return Err(BackendError::InvalidRequest("empty pattern".to_string()));
        }
        match scope {
            SearchScope::Lines => self.search_lines(pattern, top_k),
            SearchScope::FileNames => Ok(self.search_file_names(pattern, top_k)),
            SearchScope::FileContents => Ok(self.search_file_contents(pattern, top_k)),
        }
    }
}
