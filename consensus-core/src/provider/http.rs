//! Generic OpenAI-compatible HTTP adapter.
//!
//! This is the crate's one concrete, network-facing [`ProviderAdapter`]
//! implementation. It deliberately speaks a single generic chat-completions
//! shape (JSON body in, JSON body out, bearer auth) rather than any one
//! vendor's exact wire format, since the spec this crate implements scopes
//! concrete wire formats out — callers needing a specific vendor's quirks
//! wrap or replace this adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;
use crate::model::{ModelDescriptor, ModelRef};

use super::adapter::{
    AdapterResponse, FinishReason, Message, MessageRole, ProviderAdapter, SendOptions,
    ToolCallRequest, Usage,
};

/// Static configuration for one [`HttpChatAdapter`] instance.
#[derive(Debug, Clone)]
pub struct HttpAdapterConfig {
    pub provider_name: String,
    pub base_url: String,
    pub api_key: String,
    pub models: Vec<ModelDescriptor>,
}

impl HttpAdapterConfig {
    /// Read the API key from an environment variable, matching the
    /// vendor-by-vendor env lookup convention this crate's config layer uses.
    pub fn from_env(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        env_var: &str,
        models: Vec<ModelDescriptor>,
    ) -> Option<Self> {
        let api_key = std::env::var(env_var).ok()?;
        Some(Self {
            provider_name: provider_name.into(),
            base_url: base_url.into(),
            api_key,
            models,
        })
    }
}

pub struct HttpChatAdapter {
    config: HttpAdapterConfig,
    client: reqwest::Client,
}

impl HttpChatAdapter {
    pub fn new(config: HttpAdapterConfig) -> Result<Self, ConsensusError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ConsensusError::Other(format!("failed to build http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: &'a [serde_json::Value],
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    prompt_tokens_cached: Option<u32>,
}

fn role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

fn finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl ProviderAdapter for HttpChatAdapter {
    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ConsensusError> {
        Ok(self.config.models.clone())
    }

    async fn send(
        &self,
        model: &ModelRef,
        messages: &[Message],
        options: &SendOptions,
    ) -> Result<AdapterResponse, ConsensusError> {
        let start = Instant::now();

        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();

        let body = ChatRequestBody {
            model: model.model(),
            messages: wire_messages,
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            tools: &options.tools,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs_f64(options.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(self.provider_name(), e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ConsensusError::ProviderAuth {
                provider: self.provider_name().to_string(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok());
            return Err(ConsensusError::ProviderRateLimited {
                provider: self.provider_name().to_string(),
                retry_after_secs: retry_after,
            });
        }
        if status.is_server_error() {
            return Err(ConsensusError::ProviderOverloaded {
                provider: self.provider_name().to_string(),
                message: format!("status {status}"),
            });
        }
        if !status.is_success() {
            return Err(ConsensusError::Other(format!(
                "{} returned status {status}",
                self.provider_name()
            )));
        }

        let parsed: ChatResponseBody = response
            .json()
            .await
            .map_err(|e| ConsensusError::Other(format!("failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ConsensusError::Other("provider returned no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                cached_input_tokens: u.prompt_tokens_cached,
            })
            .unwrap_or_default();

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect();

        Ok(AdapterResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            finish_reason: finish_reason(choice.finish_reason.as_deref()),
            latency_ms: start.elapsed().as_millis() as u64,
            tool_calls,
        })
    }

    async fn health(&self) -> bool {
        self.client
            .get(format!("{}/models", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

fn map_transport_error(provider: &str, e: reqwest::Error) -> ConsensusError {
    if e.is_timeout() {
        ConsensusError::ProviderTimeout {
            provider: provider.to_string(),
            elapsed_secs: 0.0,
        }
    } else {
        ConsensusError::ProviderOverloaded {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}
