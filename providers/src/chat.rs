use crate::config::{ChatProviderConfig, api_key, endpoint};
use crate::error::{ProviderError, Result};
use crate::http;
use async_trait::async_trait;
use log::debug;
use ragroute_agent::{ChatError, ChatModel, Completion, Message, Usage};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ChatModel`] backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatModel {
    http: reqwest::Client,
    config: ChatProviderConfig,
    api_key: Option<String>,
}

impl OpenAiChatModel {
    /// Build from config, reading the API key from `api_key_env` when set.
    pub fn new(config: ChatProviderConfig) -> Result<Self> {
        config.validate()?;
        let api_key = api_key(config.api_key_env.as_deref())?;
        Ok(Self {
            http: http::client(config.timeout())?,
            config,
            api_key,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<Completion> {
        let url = endpoint(&self.config.base_url, "/chat/completions");
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
        };
        let response: ChatResponse = http::post_json(
            &self.http,
            &url,
            self.api_key.as_deref(),
            &request,
            self.config.timeout(),
        )
        .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("no message content".to_string()))?;
        if let Some(usage) = &response.usage {
            debug!(
                "Chat completion used {} prompt + {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(Completion {
            content,
            usage: response.usage,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(&self, messages: &[Message]) -> std::result::Result<Completion, ChatError> {
        self.complete(messages).await.map_err(ChatError::from)
    }
}
