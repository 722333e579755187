use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// How far a query fell from the routed plan.
///
/// Levels only ever increase during a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    /// Routed or agentic retrieval produced results
    #[default]
    None,
    /// Plain `vector` retrieval, no fusion, no rerank
    SingleStrategy,
    /// No retrieval context; the caller answers from the model alone
    PureGeneration,
}

impl fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DegradationLevel::None => "none",
            DegradationLevel::SingleStrategy => "single_strategy",
            DegradationLevel::PureGeneration => "pure_generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTransition {
    pub from: DegradationLevel,
    pub to: DegradationLevel,
    pub cause: String,
}

/// Records the degradation path of one query.
#[derive(Debug, Clone, Default)]
pub struct FallbackChain {
    level: DegradationLevel,
    transitions: Vec<LevelTransition>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> DegradationLevel {
        self.level
    }

    pub fn transitions(&self) -> &[LevelTransition] {
        &self.transitions
    }

    /// Move down to `to`. Requests that would not lower the level are ignored.
    pub fn degrade(&mut self, to: DegradationLevel, cause: impl Into<String>) -> bool {
        if to <= self.level {
            return false;
        }
        let cause = cause.into();
        warn!("Degrading retrieval from {} to {to}: {cause}", self.level);
        self.transitions.push(LevelTransition {
            from: self.level,
            to,
            cause,
        });
        self.level = to;
        true
    }

    pub fn into_parts(self) -> (DegradationLevel, Vec<LevelTransition>) {
        (self.level, self.transitions)
    }
}
