//! Provider registry (§4.2): indexes models, routes calls, enforces a
//! cumulative cost hard limit across the lifetime of one orchestrator run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::ConsensusError;
use crate::model::{ModelDescriptor, ModelRef};

use super::adapter::{AdapterResponse, Message, ProviderAdapter, SendOptions};
use super::retry::RetryPolicy;

/// Which role a model is being selected for (§4.2 selection policies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRole {
    Proposer,
    Challenger,
    Reviser,
    /// Summarizer, classifier, decomposer, and judge all use the same
    /// cheapest-by-input-cost policy.
    Cheapest,
}

struct RegisteredProvider {
    adapter: Arc<dyn ProviderAdapter>,
    models: Vec<ModelDescriptor>,
}

/// Indexes `provider:model` → (adapter, descriptor) and owns the cumulative
/// cost accumulator for one orchestrator run.
pub struct ProviderRegistry {
    providers: HashMap<String, RegisteredProvider>,
    descriptors: HashMap<ModelRef, ModelDescriptor>,
    /// USD spent so far, keyed by provider name.
    cost_accumulator: Mutex<HashMap<String, f64>>,
    cost_hard_limit: f64,
    retry_policy: RetryPolicy,
}

impl ProviderRegistry {
    /// `cost_hard_limit == 0.0` disables the limit (§8 boundary behavior).
    pub fn new(cost_hard_limit: f64, retry_policy: RetryPolicy) -> Self {
        Self {
            providers: HashMap::new(),
            descriptors: HashMap::new(),
            cost_accumulator: Mutex::new(HashMap::new()),
            cost_hard_limit,
            retry_policy,
        }
    }

    /// Register an adapter and its models, refreshed via `list_models`.
    pub async fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> Result<(), ConsensusError> {
        let models = adapter.list_models().await?;
        for descriptor in &models {
            self.descriptors
                .insert(descriptor.reference.clone(), descriptor.clone());
        }
        self.providers.insert(
            adapter.provider_name().to_string(),
            RegisteredProvider { adapter, models },
        );
        Ok(())
    }

    pub fn descriptor(&self, model: &ModelRef) -> Option<&ModelDescriptor> {
        self.descriptors.get(model)
    }

    pub fn all_descriptors(&self) -> Vec<&ModelDescriptor> {
        self.descriptors.values().collect()
    }

    /// Cumulative cost spent so far, summed across providers.
    pub fn total_cost(&self) -> f64 {
        self.cost_accumulator.lock().unwrap().values().sum()
    }

    fn projected_cost(&self, model: &ModelRef, input_tokens: u32, output_tokens: u32) -> Option<f64> {
        self.descriptors
            .get(model)
            .map(|d| d.estimate_cost(input_tokens, output_tokens))
    }

    /// Hard-limit check performed *before* dispatch, per §4.2/§8 invariant 4.
    /// A conservative estimate is used since actual output tokens are not
    /// yet known; callers pass their best estimate (e.g. `max_output_tokens`).
    fn check_cost_limit(&self, estimated_cost: f64) -> Result<(), ConsensusError> {
        if self.cost_hard_limit <= 0.0 {
            return Ok(());
        }
        let cumulative = self.total_cost();
        if cumulative + estimated_cost > self.cost_hard_limit {
            return Err(ConsensusError::CostLimitExceeded {
                cumulative,
                projected: estimated_cost,
                limit: self.cost_hard_limit,
            });
        }
        Ok(())
    }

    fn record_cost(&self, provider: &str, cost: f64) {
        let mut acc = self.cost_accumulator.lock().unwrap();
        *acc.entry(provider.to_string()).or_insert(0.0) += cost;
    }

    /// Send one message list to `model`, enforcing the cost gate and the
    /// retry policy, and updating the cost accumulator on success.
    pub async fn send(
        &self,
        model: &ModelRef,
        messages: &[Message],
        options: &SendOptions,
    ) -> Result<AdapterResponse, ConsensusError> {
        let descriptor = self
            .descriptors
            .get(model)
            .ok_or_else(|| ConsensusError::ModelNotFound(model.to_string()))?
            .clone();

        let estimate = descriptor.estimate_cost(
            estimate_input_tokens(messages),
            options.max_output_tokens.unwrap_or(descriptor.max_output_tokens),
        );
        self.check_cost_limit(estimate)?;

        let provider = self
            .providers
            .get(model.provider())
            .ok_or_else(|| ConsensusError::ModelNotFound(model.to_string()))?;
        let adapter = provider.adapter.clone();

        let model = model.clone();
        let messages = messages.to_vec();
        let options = options.clone();
        let response = self
            .retry_policy
            .run(|| {
                let adapter = adapter.clone();
                let model = model.clone();
                let messages = messages.clone();
                let options = options.clone();
                async move { adapter.send(&model, &messages, &options).await }
            })
            .await?;

        let actual_cost =
            descriptor.estimate_cost(response.usage.input_tokens, response.usage.output_tokens);
        self.record_cost(model.provider(), actual_cost);
        debug!(model = %model, cost = actual_cost, "provider call accounted");
        Ok(response)
    }

    /// Select a model for `role` from the set of currently registered models,
    /// restricted to `panel` when non-empty (the configured whitelist).
    pub fn select(&self, role: SelectionRole, panel: &[ModelRef]) -> Result<ModelRef, ConsensusError> {
        let candidates: Vec<&ModelDescriptor> = self
            .descriptors
            .values()
            .filter(|d| panel.is_empty() || panel.contains(&d.reference))
            .collect();

        if candidates.is_empty() {
            return Err(ConsensusError::InsufficientModels(
                "no models available for selection".to_string(),
            ));
        }

        match role {
            SelectionRole::Proposer | SelectionRole::Reviser => {
                let mut eligible: Vec<&&ModelDescriptor> = candidates
                    .iter()
                    .filter(|d| d.proposer_eligible)
                    .collect();
                if eligible.is_empty() {
                    return Err(ConsensusError::InsufficientModels(
                        "no proposer-eligible models registered".to_string(),
                    ));
                }
                eligible.sort_by(|a, b| {
                    b.output_cost_per_million
                        .partial_cmp(&a.output_cost_per_million)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.reference.as_str().cmp(b.reference.as_str()))
                });
                Ok(eligible[0].reference.clone())
            }
            SelectionRole::Cheapest => {
                let mut sorted = candidates;
                sorted.sort_by(|a, b| {
                    a.input_cost_per_million
                        .partial_cmp(&b.input_cost_per_million)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.reference.as_str().cmp(b.reference.as_str()))
                });
                Ok(sorted[0].reference.clone())
            }
            SelectionRole::Challenger => Err(ConsensusError::InvalidState(
                "use select_challengers for challenger selection".to_string(),
            )),
        }
    }

    /// Challenger selection (§4.2): cross-provider diversity first, then
    /// same-provider fill, then proposer self-ensemble if still short.
    pub fn select_challengers(
        &self,
        proposer: &ModelRef,
        count: usize,
        panel: &[ModelRef],
    ) -> Vec<ModelRef> {
        let mut candidates: Vec<&ModelDescriptor> = self
            .descriptors
            .values()
            .filter(|d| panel.is_empty() || panel.contains(&d.reference))
            .filter(|d| &d.reference != proposer)
            .collect();
        candidates.sort_by(|a, b| a.reference.as_str().cmp(b.reference.as_str()));

        let mut chosen: Vec<ModelRef> = Vec::new();
        let mut used_providers: Vec<&str> = Vec::new();

        for d in &candidates {
            if chosen.len() >= count {
                break;
            }
            if !used_providers.contains(&d.reference.provider()) {
                used_providers.push(d.reference.provider());
                chosen.push(d.reference.clone());
            }
        }
        for d in &candidates {
            if chosen.len() >= count {
                break;
            }
            if !chosen.contains(&d.reference) {
                chosen.push(d.reference.clone());
            }
        }
        while chosen.len() < count {
            info!(proposer = %proposer, "falling back to proposer self-ensemble for challenger slot");
            chosen.push(proposer.clone());
        }
        chosen
    }
}

/// Character-count token estimate for a prospective request, used only to
/// produce a conservative pre-dispatch cost estimate (§4.2).
fn estimate_input_tokens(messages: &[Message]) -> u32 {
    let chars: usize = messages.iter().map(|m| m.content.len()).sum();
    (chars as f64 / 4.0).ceil() as u32
}
