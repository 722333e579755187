use crate::error::ConfigError;
use ragroute_agent::AgentConfig;
use ragroute_providers::{ChatProviderConfig, RerankProviderConfig};
use ragroute_retrieval::{FusionConfig, RerankConfig, StrategyId};
use ragroute_router::RouterConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Engine configuration, usually loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Overall budget for one query
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Deadline for each strategy in a fan-out
    #[serde(default = "default_strategy_timeout_ms")]
    pub strategy_timeout_ms: u64,

    /// Candidates requested from each strategy
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Results returned when the query does not say otherwise
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default)]
    pub strategies: StrategyToggles,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub rerank: RerankConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Per-strategy enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyToggles {
    #[serde(default = "default_true")]
    pub vector: bool,
    #[serde(default = "default_true")]
    pub bm25: bool,
    #[serde(default = "default_true")]
    pub hybrid: bool,
    #[serde(default = "default_true")]
    pub grep: bool,
    #[serde(default = "default_true")]
    pub files_via_metadata: bool,
    #[serde(default = "default_true")]
    pub files_via_content: bool,
}

/// Optional remote models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatProviderConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankProviderConfig>,
}

fn default_timeout_seconds() -> u64 {
    20
}

fn default_strategy_timeout_ms() -> u64 {
    5_000
}

fn default_top_k() -> usize {
    20
}

fn default_max_results() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self {
            vector: true,
            bm25: true,
            hybrid: true,
            grep: true,
            files_via_metadata: true,
            files_via_content: true,
        }
    }
}

impl StrategyToggles {
    pub fn is_enabled(&self, strategy: StrategyId) -> bool {
        match strategy {
            StrategyId::Vector => self.vector,
            StrategyId::Bm25 => self.bm25,
            StrategyId::Hybrid => self.hybrid,
            StrategyId::Grep => self.grep,
            StrategyId::FilesViaMetadata => self.files_via_metadata,
            StrategyId::FilesViaContent => self.files_via_content,
        }
    }

    pub fn set(&mut self, strategy: StrategyId, enabled: bool) {
        let flag = match strategy {
            StrategyId::Vector => &mut self.vector,
            StrategyId::Bm25 => &mut self.bm25,
            StrategyId::Hybrid => &mut self.hybrid,
            StrategyId::Grep => &mut self.grep,
            StrategyId::FilesViaMetadata => &mut self.files_via_metadata,
            StrategyId::FilesViaContent => &mut self.files_via_content,
        };
        *flag = enabled;
    }

    pub fn enabled(&self) -> BTreeSet<StrategyId> {
        StrategyId::ALL
            .into_iter()
            .filter(|strategy| self.is_enabled(*strategy))
            .collect()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            strategy_timeout_ms: default_strategy_timeout_ms(),
            top_k: default_top_k(),
            max_results: default_max_results(),
            strategies: StrategyToggles::default(),
            fusion: FusionConfig::default(),
            rerank: RerankConfig::default(),
            router: RouterConfig::default(),
            agent: AgentConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("timeout_seconds must be > 0".to_string()));
        }

        if self.strategy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "strategy_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be > 0".to_string()));
        }

        if self.max_results == 0 {
            return Err(ConfigError::Invalid("max_results must be > 0".to_string()));
        }

        if self.max_results > self.top_k {
            return Err(ConfigError::Invalid(format!(
                "max_results ({}) cannot exceed top_k ({})",
                self.max_results, self.top_k
            )));
        }

        if self.strategies.enabled().is_empty() {
            return Err(ConfigError::Invalid(
                "at least one strategy must be enabled".to_string(),
            ));
        }

        self.fusion.validate().map_err(ConfigError::Invalid)?;
        self.rerank.validate().map_err(ConfigError::Invalid)?;
        self.router.validate().map_err(ConfigError::Invalid)?;
        self.agent.validate().map_err(ConfigError::Invalid)?;

        if let Some(chat) = &self.providers.chat {
            chat.validate()
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        if let Some(rerank) = &self.providers.rerank {
            rerank
                .validate()
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }

        Ok(())
    }

    /// Create config optimized for speed: no agent, no rerank.
    pub fn fast() -> Self {
        let mut strategies = StrategyToggles::default();
        strategies.set(StrategyId::Hybrid, false);
        Self {
            timeout_seconds: 5,
            strategy_timeout_ms: 1_500,
            top_k: 10,
            strategies,
            rerank: RerankConfig {
                enabled: false,
                ..Default::default()
            },
            agent: AgentConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create config optimized for recall: wider fan-out, more agent room.
    pub fn thorough() -> Self {
        Self {
            timeout_seconds: 60,
            strategy_timeout_ms: 10_000,
            top_k: 50,
            fusion: FusionConfig {
                multi_strategies: vec![StrategyId::Vector, StrategyId::Bm25, StrategyId::Grep],
                ..Default::default()
            },
            rerank: RerankConfig {
                top_n: 20,
                ..Default::default()
            },
            agent: AgentConfig {
                max_iterations: 8,
                max_llm_calls: 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
