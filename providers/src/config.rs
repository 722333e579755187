use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatProviderConfig {
    /// e.g. `https://api.openai.com/v1`
    pub base_url: String,

    pub model: String,

    /// Environment variable holding the bearer token
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_chat_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Cross-encoder service answering `POST {base_url}{path}` with
/// `{"results": [{"index", "relevance_score"}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankProviderConfig {
    pub base_url: String,

    pub model: String,

    #[serde(default = "default_rerank_path")]
    pub path: String,

    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_rerank_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_chat_timeout_ms() -> u64 {
    30_000
}

fn default_rerank_timeout_ms() -> u64 {
    10_000
}

fn default_rerank_path() -> String {
    "/rerank".to_string()
}

impl ChatProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint("providers.chat", &self.base_url, &self.model, self.timeout_ms)?;
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ProviderError::InvalidConfig(
                "providers.chat.temperature must be within 0..=2".to_string(),
            ));
        }
        Ok(())
    }
}

impl RerankProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint("providers.rerank", &self.base_url, &self.model, self.timeout_ms)?;
        if !self.path.starts_with('/') {
            return Err(ProviderError::InvalidConfig(
                "providers.rerank.path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_endpoint(section: &str, base_url: &str, model: &str, timeout_ms: u64) -> Result<()> {
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ProviderError::InvalidConfig(format!(
            "{section}.base_url must be an http(s) URL"
        )));
    }
    if model.trim().is_empty() {
        return Err(ProviderError::InvalidConfig(format!(
            "{section}.model must not be empty"
        )));
    }
    if timeout_ms == 0 {
        return Err(ProviderError::InvalidConfig(format!(
            "{section}.timeout_ms must be > 0"
        )));
    }
    Ok(())
}

/// Read the API key named by `env`, if any.
pub(crate) fn api_key(env: Option<&str>) -> Result<Option<String>> {
    let Some(name) = env else {
        return Ok(None);
    };
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
        _ => Err(ProviderError::MissingApiKey(name.to_string())),
    }
}

/// Join `base_url` and `path` without doubling the slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}
