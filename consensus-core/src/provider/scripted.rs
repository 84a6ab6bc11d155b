//! A deterministic, in-memory [`ProviderAdapter`] for tests.
//!
//! Queues canned responses (or failures) per model and returns them in
//! order, so orchestrator tests never perform real network I/O, matching
//! this codebase's convention of hand-rolled fakes per module rather than a
//! mocking framework crossing async-trait boundaries.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ConsensusError;
use crate::model::{ModelDescriptor, ModelRef};

use super::adapter::{AdapterResponse, Message, ProviderAdapter, SendOptions};

/// One queued outcome for a scripted model.
pub enum Scripted {
    Response(AdapterResponse),
    Fail(ConsensusError),
}

pub struct ScriptedAdapter {
    provider_name: String,
    models: Vec<ModelDescriptor>,
    queues: Mutex<HashMap<String, Vec<Scripted>>>,
    healthy: Mutex<bool>,
}

impl ScriptedAdapter {
    pub fn new(provider_name: impl Into<String>, models: Vec<ModelDescriptor>) -> Self {
        Self {
            provider_name: provider_name.into(),
            models,
            queues: Mutex::new(HashMap::new()),
            healthy: Mutex::new(true),
        }
    }

    /// Queue a response to be returned by the next [`ProviderAdapter::send`]
    /// call against `model`.
    pub fn push(&self, model: &ModelRef, outcome: Scripted) {
        self.queues
            .lock()
            .unwrap()
            .entry(model.as_str().to_string())
            .or_default()
            .push(outcome);
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap() = healthy;
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ConsensusError> {
        Ok(self.models.clone())
    }

    async fn send(
        &self,
        model: &ModelRef,
        _messages: &[Message],
        _options: &SendOptions,
    ) -> Result<AdapterResponse, ConsensusError> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues
            .get_mut(model.as_str())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                ConsensusError::Other(format!("no scripted response queued for {model}"))
            })?;
        match queue.remove(0) {
            Scripted::Response(r) => Ok(r),
            Scripted::Fail(e) => Err(e),
        }
    }

    async fn health(&self) -> bool {
        *self.healthy.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::adapter::{FinishReason, Usage};

    fn descriptor(m: &ModelRef) -> ModelDescriptor {
        ModelDescriptor {
            reference: m.clone(),
            context_window: 32_000,
            max_output_tokens: 4096,
            input_cost_per_million: 1.0,
            output_cost_per_million: 2.0,
            supports_tools: false,
            supports_streaming: false,
            proposer_eligible: true,
        }
    }

    #[tokio::test]
    async fn returns_queued_responses_in_order() {
        let m = ModelRef::new("mock", "alpha");
        let adapter = ScriptedAdapter::new("mock", vec![descriptor(&m)]);
        adapter.push(
            &m,
            Scripted::Response(AdapterResponse {
                content: "first".into(),
                usage: Usage::default(),
                finish_reason: FinishReason::Stop,
                latency_ms: 1,
                tool_calls: vec![],
            }),
        );
        adapter.push(&m, Scripted::Fail(ConsensusError::Other("boom".into())));

        let options = SendOptions::default();
        let r1 = adapter.send(&m, &[], &options).await.unwrap();
        assert_eq!(r1.content, "first");

        let r2 = adapter.send(&m, &[], &options).await;
        assert!(r2.is_err());
    }
}
