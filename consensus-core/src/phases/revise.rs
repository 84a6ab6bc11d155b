//! REVISE handler (§4.5).

use crate::error::ConsensusResult;
use crate::model::ModelRef;
use crate::persistence::types::{Contribution, ContributionRole, TurnId};
use crate::provider::{Message, ProviderRegistry, SendOptions};

const SYSTEM_PROMPT: &str = "Revise your proposal. Address each challenge directly: retain \
points you got right, incorporate genuinely better alternatives, and push back on challenges \
that are wrong with a brief explanation. Do not mention that this is a debate or refer to \
\"challenges\" by name in your final answer — write it as a standalone, improved answer.";

fn user_prompt(question: &str, proposal: &str, challenges: &[Contribution]) -> String {
    let mut prompt = format!("Question: {question}\n\nOriginal proposal:\n{proposal}\n\nChallenges:\n");
    for challenge in challenges {
        prompt.push_str(&format!("- [{}]: {}\n", challenge.model_ref, challenge.content));
    }
    prompt
}

/// Calls the proposer model (by default) to address every challenge.
pub async fn run_revise(
    registry: &ProviderRegistry,
    reviser: &ModelRef,
    turn_id: &TurnId,
    question: &str,
    proposal: &str,
    challenges: &[Contribution],
) -> ConsensusResult<Contribution> {
    let messages = vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(user_prompt(question, proposal, challenges)),
    ];

    let response = registry.send(reviser, &messages, &SendOptions::default()).await?;
    let descriptor = registry.descriptor(reviser);
    let cost = descriptor
        .map(|d| d.estimate_cost(response.usage.input_tokens, response.usage.output_tokens))
        .unwrap_or(0.0);

    let mut contribution = Contribution::new(
        turn_id.clone(),
        reviser.clone(),
        ContributionRole::Reviser,
        response.content,
        response.usage.input_tokens,
        response.usage.output_tokens,
        cost,
        response.latency_ms,
    );
    contribution.truncated = Some(response.truncated());
    Ok(contribution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelRef;
    use crate::persistence::types::ContributionRole;

    #[test]
    fn prompt_includes_every_challenge_with_attribution() {
        let challenge = Contribution::new(
            "turn-1".to_string(),
            ModelRef::new("acme", "critic"),
            ContributionRole::Challenger,
            "this misses an edge case",
            10,
            10,
            0.001,
            20,
        );
        let prompt = user_prompt("q", "proposal text", std::slice::from_ref(&challenge));
        assert!(prompt.contains("acme:critic"));
        assert!(prompt.contains("this misses an edge case"));
    }
}
