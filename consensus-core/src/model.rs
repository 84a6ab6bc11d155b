//! Model references, descriptors, and the intent→confidence-cap table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `provider:model` reference uniquely identifying one model behind one
/// adapter, e.g. `acme:frontier-large`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelRef(pub String);

impl ModelRef {
    pub fn new(provider: impl AsRef<str>, model: impl AsRef<str>) -> Self {
        Self(format!("{}:{}", provider.as_ref(), model.as_ref()))
    }

    /// Split into `(provider, model)`. Panics if the reference has no `:`.
    pub fn split(&self) -> (&str, &str) {
        self.0
            .split_once(':')
            .expect("ModelRef must be of the form provider:model")
    }

    pub fn provider(&self) -> &str {
        self.split().0
    }

    pub fn model(&self) -> &str {
        self.split().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Capability and cost metadata for one model, as reported by
/// [`crate::provider::ProviderAdapter::list_models`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub reference: ModelRef,
    pub context_window: u32,
    pub max_output_tokens: u32,
    /// USD per million input tokens.
    pub input_cost_per_million: f64,
    /// USD per million output tokens.
    pub output_cost_per_million: f64,
    /// Whether this model supports tool/function calling.
    pub supports_tools: bool,
    /// Whether this model supports streaming responses.
    pub supports_streaming: bool,
    /// Whether this model is eligible to act as proposer (§4.2).
    pub proposer_eligible: bool,
}

impl ModelDescriptor {
    /// `cost = (input_tokens/1e6)*input_cost + (output_tokens/1e6)*output_cost`.
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million
    }
}

/// Coarse question classification, produced by the classifier (§4.11) or
/// supplied directly by a caller, and consumed by [`domain_cap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Factual,
    Technical,
    Creative,
    Judgment,
    Strategic,
    Default,
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Default
    }
}

/// Per-intent epistemic confidence ceiling (§4.5, Calibration).
pub fn domain_cap(intent: Intent) -> f64 {
    match intent {
        Intent::Factual => 0.95,
        Intent::Technical => 0.90,
        Intent::Creative => 0.85,
        Intent::Judgment => 0.80,
        Intent::Strategic => 0.70,
        Intent::Default => 0.85,
    }
}
