//! PROPOSE handler (§4.5).

use chrono::Utc;

use crate::error::ConsensusResult;
use crate::model::ModelRef;
use crate::persistence::types::{Contribution, ContributionRole, TurnId};
use crate::provider::{Message, ProviderRegistry, SendOptions};
use crate::state_machine::RoundRecord;

fn system_prompt() -> String {
    let today = Utc::now().format("%Y-%m-%d");
    format!(
        "Today's date is {today}. You are an expert advisor producing a rigorous, well-reasoned \
         answer to the question below. Be concrete and specific; state assumptions explicitly."
    )
}

fn user_prompt(question: &str, previous_round: Option<&RoundRecord>) -> String {
    match previous_round {
        None => format!("Question: {question}"),
        Some(round) => {
            let mut prompt = format!(
                "Question: {question}\n\nYour previous answer:\n{}\n\nChallenges raised against \
                 it:\n",
                round.decision.content
            );
            for challenge in &round.challenges {
                prompt.push_str(&format!("- [{}]: {}\n", challenge.model_ref, challenge.content));
            }
            prompt.push_str("\nImprove your answer in light of these challenges.");
            prompt
        }
    }
}

/// Calls the proposer model and records Contribution(role=proposer).
pub async fn run_propose(
    registry: &ProviderRegistry,
    proposer: &ModelRef,
    turn_id: &TurnId,
    question: &str,
    previous_round: Option<&RoundRecord>,
) -> ConsensusResult<Contribution> {
    let messages = vec![
        Message::system(system_prompt()),
        Message::user(user_prompt(question, previous_round)),
    ];

    let response = registry.send(proposer, &messages, &SendOptions::default()).await?;
    let descriptor = registry.descriptor(proposer);
    let cost = descriptor
        .map(|d| d.estimate_cost(response.usage.input_tokens, response.usage.output_tokens))
        .unwrap_or(0.0);

    let mut contribution = Contribution::new(
        turn_id.clone(),
        proposer.clone(),
        ContributionRole::Proposer,
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

    #[test]
    fn first_round_prompt_has_no_previous_context() {
        let prompt = user_prompt("should I use rust?", None);
        assert!(prompt.contains("should I use rust?"));
        assert!(!prompt.contains("Challenges raised"));
    }

    #[test]
    fn system_prompt_is_date_grounded() {
        let prompt = system_prompt();
        assert!(prompt.starts_with("Today's date is"));
    }
}
