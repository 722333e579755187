use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the planning agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Route complex queries to the agent (requires a chat model)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound on think/act/observe iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Upper bound on LLM calls per query
    #[serde(default = "default_max_llm_calls")]
    pub max_llm_calls: u32,

    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,

    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,

    /// Nodes shown to the model per observation
    #[serde(default = "default_observation_preview")]
    pub observation_preview: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_iterations() -> usize {
    5
}

fn default_max_llm_calls() -> u32 {
    6
}

fn default_llm_timeout_ms() -> u64 {
    15_000
}

fn default_tool_timeout_ms() -> u64 {
    5_000
}

fn default_observation_preview() -> usize {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: default_max_iterations(),
            max_llm_calls: default_max_llm_calls(),
            llm_timeout_ms: default_llm_timeout_ms(),
            tool_timeout_ms: default_tool_timeout_ms(),
            observation_preview: default_observation_preview(),
        }
    }
}

impl AgentConfig {
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("agent.max_iterations must be > 0".to_string());
        }

        if self.max_llm_calls == 0 {
            return Err("agent.max_llm_calls must be > 0".to_string());
        }

        if self.llm_timeout_ms == 0 || self.tool_timeout_ms == 0 {
            return Err("agent timeouts must be > 0".to_string());
        }

        Ok(())
    }
}
