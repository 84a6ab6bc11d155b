//! Protocol classifier (§4.11): a single cheap-model call deciding whether a
//! question is better served by the consensus protocol (iterative
//! reasoning) or the voting protocol (independent judgment). Used only for
//! `protocol: auto`.

use serde::{Deserialize, Serialize};

use crate::error::{ConsensusError, ConsensusResult};
use crate::provider::{Message, ProviderRegistry, SelectionRole, SendOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolChoice {
    Reasoning,
    Judgment,
}

impl ProtocolChoice {
    /// Reasoning routes to the consensus protocol; judgment to voting.
    pub fn protocol_name(self) -> &'static str {
        match self {
            Self::Reasoning => "consensus",
            Self::Judgment => "voting",
        }
    }
}

const CLASSIFIER_SYSTEM_PROMPT: &str = "You classify a question as requiring either iterative \
multi-round REASONING (design tradeoffs, open-ended technical or strategic questions benefiting \
from debate and revision) or independent JUDGMENT (questions better answered by aggregating \
several independent opinions, e.g. factual lookups or subjective preference calls). Respond with \
exactly one word: `reasoning` or `judgment`.";

/// Classifies `question` by making one call against the registry's cheapest
/// eligible model.
pub async fn classify_protocol(
    registry: &ProviderRegistry,
    question: &str,
) -> ConsensusResult<ProtocolChoice> {
    let model = registry.select(SelectionRole::Cheapest, &[])?;

    let messages = vec![
        Message::system(CLASSIFIER_SYSTEM_PROMPT),
        Message::user(question),
    ];

    let options = SendOptions {
        temperature: 0.0,
        max_output_tokens: Some(8),
        ..Default::default()
    };
    let response = registry.send(&model, &messages, &options).await?;

    parse_choice(&response.content)
}

fn parse_choice(text: &str) -> ConsensusResult<ProtocolChoice> {
    let normalized = text.trim().to_lowercase();
    if normalized.contains("judgment") {
        Ok(ProtocolChoice::Judgment)
    } else if normalized.contains("reasoning") {
        Ok(ProtocolChoice::Reasoning)
    } else {
        Err(ConsensusError::InvalidState(format!(
            "classifier returned unparseable response: {text:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_tokens() {
        assert_eq!(parse_choice("reasoning").unwrap(), ProtocolChoice::Reasoning);
        assert_eq!(parse_choice("judgment").unwrap(), ProtocolChoice::Judgment);
    }

    #[test]
    fn parses_with_surrounding_noise() {
        assert_eq!(
            parse_choice(" Judgment.\n").unwrap(),
            ProtocolChoice::Judgment
        );
    }

    #[test]
    fn unparseable_response_is_invalid_state() {
        assert!(parse_choice("I'm not sure").is_err());
    }

    #[test]
    fn protocol_name_maps_correctly() {
        assert_eq!(ProtocolChoice::Reasoning.protocol_name(), "consensus");
        assert_eq!(ProtocolChoice::Judgment.protocol_name(), "voting");
    }
}
