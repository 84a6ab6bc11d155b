//! Recognized configuration options (§6 "Configuration"). Each field mirrors
//! one enumerated option; defaults match the spec literally.

use serde::{Deserialize, Serialize};

use crate::convergence::DEFAULT_CONVERGENCE_THRESHOLD;
use crate::model::ModelRef;
use crate::persistence::types::ChallengeFraming;
use crate::tools::DEFAULT_MAX_TOOL_ROUNDS;
use crate::voting::VotingAggregation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Consensus,
    Voting,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposerStrategy {
    TopCost,
    RoundRobin,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub max_rounds: u32,
    pub protocol: Protocol,
    pub decompose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            protocol: Protocol::Consensus,
            decompose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub panel: Vec<ModelRef>,
    pub proposer_strategy: ProposerStrategy,
    pub challenge_framings: Vec<ChallengeFraming>,
    pub min_challengers: u32,
    pub convergence_threshold: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            panel: Vec::new(),
            proposer_strategy: ProposerStrategy::TopCost,
            challenge_framings: ChallengeFraming::ROTATION.to_vec(),
            min_challengers: 2,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfig {
    pub aggregation: VotingAggregationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingAggregationConfig {
    Majority,
    Weighted,
}

impl From<VotingAggregationConfig> for VotingAggregation {
    fn from(value: VotingAggregationConfig) -> Self {
        match value {
            VotingAggregationConfig::Majority => VotingAggregation::Majority,
            VotingAggregationConfig::Weighted => VotingAggregation::Weighted,
        }
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            aggregation: VotingAggregationConfig::Majority,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub enabled: bool,
    pub max_rounds: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// `hard_limit == 0.0` disables the limit (§8 boundary behavior).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    pub warn_threshold: Option<f64>,
    pub hard_limit: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            warn_threshold: None,
            hard_limit: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeConfig {
    pub max_subtasks: u32,
    pub min_subtasks: u32,
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            max_subtasks: 7,
            min_subtasks: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub general: GeneralConfig,
    pub consensus: ConsensusConfig,
    pub voting: VotingConfig,
    pub tools: ToolsConfig,
    pub cost: CostConfig,
    pub decompose: DecomposeConfig,
}

impl OrchestratorConfig {
    /// Validates cross-field constraints not expressible in `Default` alone.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.consensus.convergence_threshold) {
            return Err(format!(
                "consensus.convergence_threshold must be in [0,1], got {}",
                self.consensus.convergence_threshold
            ));
        }
        if self.decompose.min_subtasks > self.decompose.max_subtasks {
            return Err(format!(
                "decompose.min_subtasks ({}) must be <= decompose.max_subtasks ({})",
                self.decompose.min_subtasks, self.decompose.max_subtasks
            ));
        }
        if !(1..=5).contains(&self.general.max_rounds) {
            return Err(format!(
                "general.max_rounds must be in 1..=5, got {}",
                self.general.max_rounds
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literally() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.general.max_rounds, 3);
        assert_eq!(config.general.protocol, Protocol::Consensus);
        assert!(!config.general.decompose);
        assert_eq!(config.consensus.min_challengers, 2);
        assert_eq!(config.consensus.convergence_threshold, 0.7);
        assert_eq!(config.tools.max_rounds, 5);
        assert_eq!(config.cost.hard_limit, 0.0);
        assert_eq!(config.decompose.max_subtasks, 7);
        assert_eq!(config.decompose.min_subtasks, 2);
    }

    #[test]
    fn validate_rejects_inverted_subtask_bounds() {
        let mut config = OrchestratorConfig::default();
        config.decompose.min_subtasks = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_convergence_threshold() {
        let mut config = OrchestratorConfig::default();
        config.consensus.convergence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_default_config_passes_validation() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }
}
