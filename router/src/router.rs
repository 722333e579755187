use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use log::debug;
use ragroute_retrieval::{FusionConfig, Query, StrategyId, quoted_phrase};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use unicode_segmentation::UnicodeSegmentation;

/// How a query is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// One strategy, no fusion
    Single,
    /// A fixed strategy set run concurrently and fused
    MultiFixed,
    /// The planning agent chooses tools
    Agentic,
}

/// The router rule that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteRule {
    FileName,
    BroadKeyword,
    Complexity,
    Default,
}

/// Which signals the router saw in the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSignals {
    pub file_mentions: usize,
    pub quoted_paths: usize,
    pub broad_keywords: usize,
    pub words: usize,
    pub conjunctions: usize,
    pub question_marks: usize,
    pub complexity: f64,
}

/// Produced once per query and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub mode: RoutingMode,
    pub strategies: Vec<StrategyId>,
    pub weights: BTreeMap<StrategyId, f64>,
    pub rule: RouteRule,
    pub signals: RouteSignals,
}

const ENGLISH_CONJUNCTIONS: &[&str] = &["and", "or", "vs", "versus", "then", "also", "plus"];
const CJK_CONJUNCTIONS: &[&str] = &["和", "以及", "并且", "或者", "还是", "与"];

/// Rule-based strategy selection. First matching rule wins:
///
/// 1. file name or quoted path → `files_via_metadata`
/// 2. broad keyword → `files_via_content`
/// 3. complexity at or above the threshold → agent (or the fixed multi-strategy set)
/// 4. otherwise → `vector`
pub struct QueryRouter {
    config: RouterConfig,
    file_pattern: Option<Regex>,
    enabled: BTreeSet<StrategyId>,
    multi_strategies: Vec<StrategyId>,
    multi_weights: BTreeMap<StrategyId, f64>,
    agent_available: bool,
}

impl QueryRouter {
    pub fn new(
        config: RouterConfig,
        fusion: &FusionConfig,
        enabled: BTreeSet<StrategyId>,
        agent_available: bool,
    ) -> Result<Self> {
        config.validate().map_err(RouterError::InvalidConfig)?;
        if enabled.is_empty() {
            return Err(RouterError::NoEnabledStrategy);
        }

        let file_pattern = if config.file_extensions.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = config
                .file_extensions
                .iter()
                .map(|ext| regex_lite::escape(ext))
                .collect();
            Some(Regex::new(&format!(
                r"(?i)[\w./\\-]+\.(?:{})\b",
                alternatives.join("|")
            ))?)
        };

        let multi_strategies: Vec<StrategyId> = fusion
            .multi_strategies
            .iter()
            .copied()
            .filter(|strategy| enabled.contains(strategy))
            .collect();
        let multi_weights = fusion.weights_for(&multi_strategies);

        Ok(Self {
            config,
            file_pattern,
            enabled,
            multi_strategies,
            multi_weights,
            agent_available,
        })
    }

    pub fn agent_available(&self) -> bool {
        self.agent_available
    }

    pub fn enabled(&self) -> &BTreeSet<StrategyId> {
        &self.enabled
    }

    /// Pick the execution mode and strategies for `query`.
    pub fn route(&self, query: &Query) -> RoutingDecision {
        let signals = self.signals(query.text());
        debug!("Routing query '{}' with {signals:?}", query.text());

        if signals.file_mentions + signals.quoted_paths > 0
            && let Some(decision) = self.single(StrategyId::FilesViaMetadata, RouteRule::FileName, &signals)
        {
            return decision;
        }

        if signals.broad_keywords > 0
            && let Some(decision) =
                self.single(StrategyId::FilesViaContent, RouteRule::BroadKeyword, &signals)
        {
            return decision;
        }

        if signals.complexity >= self.config.complexity_threshold {
            if self.agent_available {
                return RoutingDecision {
                    mode: RoutingMode::Agentic,
                    strategies: self.enabled.iter().copied().collect(),
                    weights: BTreeMap::new(),
                    rule: RouteRule::Complexity,
                    signals,
                };
            }
            if !self.multi_strategies.is_empty() {
                return RoutingDecision {
                    mode: RoutingMode::MultiFixed,
                    strategies: self.multi_strategies.clone(),
                    weights: self.multi_weights.clone(),
                    rule: RouteRule::Complexity,
                    signals,
                };
            }
        }

        let fallback = if self.enabled.contains(&StrategyId::Vector) {
            StrategyId::Vector
        } else {
            // `new` rejects an empty set.
            self.enabled.iter().next().copied().unwrap_or(StrategyId::Vector)
        };
        RoutingDecision {
            mode: RoutingMode::Single,
            strategies: vec![fallback],
            weights: BTreeMap::from([(fallback, 1.0)]),
            rule: RouteRule::Default,
            signals,
        }
    }

    fn single(
        &self,
        strategy: StrategyId,
        rule: RouteRule,
        signals: &RouteSignals,
    ) -> Option<RoutingDecision> {
        if !self.enabled.contains(&strategy) {
            debug!("Rule {rule:?} matched but {strategy} is disabled");
            return None;
        }
        Some(RoutingDecision {
            mode: RoutingMode::Single,
            strategies: vec![strategy],
            weights: BTreeMap::from([(strategy, 1.0)]),
            rule,
            signals: signals.clone(),
        })
    }

    fn signals(&self, text: &str) -> RouteSignals {
        let lower = text.to_lowercase();

        let file_mentions = self
            .file_pattern
            .as_ref()
            .map_or(0, |pattern| pattern.find_iter(text).count());
        let quoted_paths = usize::from(
            quoted_phrase(text).is_some_and(|phrase| phrase.contains('/') || phrase.contains('\\')),
        );
        let broad_keywords = self
            .config
            .broad_keywords
            .iter()
            .filter(|kw| lower.contains(kw.to_lowercase().as_str()))
            .count();

        let words: Vec<&str> = lower.unicode_words().collect();
        let conjunctions = words
            .iter()
            .filter(|word| ENGLISH_CONJUNCTIONS.contains(word))
            .count()
            + CJK_CONJUNCTIONS
                .iter()
                .map(|conj| lower.matches(conj).count())
                .sum::<usize>();
        let question_marks = text.chars().filter(|c| matches!(c, '?' | '？')).count();

        RouteSignals {
            file_mentions,
            quoted_paths,
            broad_keywords,
            words: words.len(),
            conjunctions,
            question_marks,
            complexity: estimated_complexity(words.len(), conjunctions, question_marks),
        }
    }
}

/// Normalized to `[0, 1]`. Long queries, several joined clauses and several
/// questions each push towards multi-step handling.
pub fn estimated_complexity(words: usize, conjunctions: usize, question_marks: usize) -> f64 {
    let length = (words as f64 / 30.0).min(1.0);
    let clauses = (conjunctions as f64 / 2.0).min(1.0);
    let questions = (question_marks.saturating_sub(1) as f64 / 2.0).min(1.0);
    0.4 * length + 0.35 * clauses + 0.25 * questions
}
