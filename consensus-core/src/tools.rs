//! Tool-augmented send (§4.10): framework only. No concrete tool is
//! implemented; callers supply a [`ToolRegistry`].

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ConsensusError, ConsensusResult};
use crate::model::ModelRef;
use crate::provider::{AdapterResponse, FinishReason, Message, ProviderRegistry, SendOptions};

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

#[derive(Debug, Clone)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

/// Tool implementations are outside this crate's scope; this trait is the
/// seam a caller plugs concrete tools into.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn list(&self) -> Vec<String>;
    fn describe(&self, name: &str) -> Option<ToolDescription>;
    async fn invoke(&self, name: &str, args: Value) -> ConsensusResult<Value>;
}

/// Sends `messages` against `model`, executing any requested tool calls in
/// a bounded loop. If the bound is reached with pending tool calls, the
/// last model text is returned as-is (§4.10).
pub async fn send_with_tools(
    registry: &ProviderRegistry,
    tools: &dyn ToolRegistry,
    model: &ModelRef,
    mut messages: Vec<Message>,
    options: &SendOptions,
    max_tool_rounds: u32,
) -> ConsensusResult<AdapterResponse> {
    let mut last_response: Option<AdapterResponse> = None;

    for _round in 0..max_tool_rounds {
        let response = registry.send(model, &messages, options).await?;

        if response.tool_calls.is_empty() {
            return Ok(response);
        }

        messages.push(Message::assistant(response.content.clone()));

        for call in &response.tool_calls {
            let result = tools.invoke(&call.name, call.arguments.clone()).await;
            let tool_text = match result {
                Ok(value) => value.to_string(),
                Err(err) => format!("error: {err}"),
            };
            messages.push(Message::tool(call.name.clone(), tool_text));
        }

        last_response = Some(response);
    }

    last_response.ok_or_else(|| {
        ConsensusError::InvalidState("tool-augmented send produced no response".to_string())
    })
}

/// Whether `response` is the natural end of a tool-augmented exchange
/// (no pending calls, or a length cutoff with none pending).
pub fn is_final(response: &AdapterResponse) -> bool {
    response.tool_calls.is_empty() || response.finish_reason == FinishReason::Length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Usage;

    fn response(tool_calls: Vec<crate::provider::ToolCallRequest>) -> AdapterResponse {
        AdapterResponse {
            content: "text".to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 10,
                cached_input_tokens: None,
            },
            finish_reason: FinishReason::Stop,
            latency_ms: 10,
            tool_calls,
        }
    }

    #[test]
    fn is_final_when_no_tool_calls_pending() {
        assert!(is_final(&response(vec![])));
    }

    #[test]
    fn not_final_when_tool_calls_pending() {
        let call = crate::provider::ToolCallRequest {
            id: "1".to_string(),
            name: "lookup".to_string(),
            arguments: serde_json::json!({}),
        };
        assert!(!is_final(&response(vec![call])));
    }
}
