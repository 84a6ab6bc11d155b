//! The provider adapter contract (§4.1).
//!
//! One adapter instance fronts one upstream LLM provider. Adapters are
//! stateless value types holding only configuration (API key, base URL,
//! HTTP client); no per-call mutable state is kept.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;
use crate::model::{ModelDescriptor, ModelRef};

/// Role of one message in a chat-style conversation sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in the ordered list passed to [`ProviderAdapter::send`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Present when `role == Tool`: the name of the tool that produced this content.
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_name: Some(name.into()),
        }
    }
}

/// Why a provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// The model hit its output token ceiling before naturally finishing.
    Length,
    ToolCalls,
    ContentFilter,
}

/// Token usage for a single call, including optional prompt cache hits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_input_tokens: Option<u32>,
}

/// A request for the orchestrator to execute a tool via the tool registry (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Per-call knobs that do not vary the adapter's identity.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    /// Tool schemas to advertise; empty disables tool calling for this call.
    pub tools: Vec<serde_json::Value>,
    pub timeout_secs: f64,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: None,
            tools: Vec::new(),
            timeout_secs: 120.0,
        }
    }
}

/// A normalized response from [`ProviderAdapter::send`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
    pub latency_ms: u64,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AdapterResponse {
    pub fn truncated(&self) -> bool {
        self.finish_reason == FinishReason::Length
    }
}

/// One chunk of a streamed response. The final chunk in a stream always
/// carries `usage` and `finish_reason`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
}

/// The uniform contract every provider adapter implements (§4.1).
///
/// Implementations must map every provider-native failure into
/// [`ConsensusError`] — nothing provider-specific leaks upward. Rate-limit
/// failures must carry a retry hint in seconds when the upstream supplies one.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier for this adapter, used as the `provider` half of
    /// every [`ModelRef`] it serves.
    fn provider_name(&self) -> &str;

    /// The models this adapter can currently serve.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ConsensusError>;

    /// Send a single request and wait for the complete response.
    async fn send(
        &self,
        model: &ModelRef,
        messages: &[Message],
        options: &SendOptions,
    ) -> Result<AdapterResponse, ConsensusError>;

    /// Send a request and return a lazy sequence of chunks. The default
    /// implementation falls back to a single non-streaming call wrapped in
    /// one chunk, for adapters that do not support incremental delivery.
    async fn stream(
        &self,
        model: &ModelRef,
        messages: &[Message],
        options: &SendOptions,
    ) -> Result<Vec<StreamChunk>, ConsensusError> {
        let resp = self.send(model, messages, options).await?;
        Ok(vec![StreamChunk {
            delta: resp.content,
            usage: Some(resp.usage),
            finish_reason: Some(resp.finish_reason),
        }])
    }

    /// Lightweight liveness probe.
    async fn health(&self) -> bool;
}
