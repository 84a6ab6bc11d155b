//! CHALLENGE handler (§4.5).

use chrono::Utc;
use futures::future::join_all;

use crate::error::{ConsensusError, ConsensusResult};
use crate::model::ModelRef;
use crate::persistence::types::{ChallengeFraming, Contribution, ContributionRole, TurnId};
use crate::provider::{Message, ProviderRegistry, SendOptions};
use crate::sycophancy::is_sycophantic;

fn system_prompt() -> String {
    let today = Utc::now().format("%Y-%m-%d");
    format!(
        "Today's date is {today}. You are a rigorous critic whose job is to find genuine fault \
         with the proposal below. Do not start with praise. Find at least one substantive \
         disagreement. If the proposal recommends one option, argue for an alternative."
    )
}

fn framing_instruction(framing: ChallengeFraming) -> &'static str {
    match framing {
        ChallengeFraming::Flaw => "Focus on identifying a concrete flaw in the reasoning.",
        ChallengeFraming::Alternative => "Focus on proposing a credible alternative approach.",
        ChallengeFraming::Risk => "Focus on the biggest risk this proposal underestimates.",
        ChallengeFraming::DevilsAdvocate => {
            "Argue the strongest possible case against this proposal, devil's-advocate style."
        }
    }
}

fn user_prompt(question: &str, proposal: &str, framing: ChallengeFraming) -> String {
    format!(
        "Question: {question}\n\nProposal:\n{proposal}\n\n{}",
        framing_instruction(framing)
    )
}

/// Fans out one call per challenger in parallel. Individual failures are
/// tolerated; the phase fails only if every challenger fails. Each
/// successful challenge is scanned for sycophancy and flagged.
pub async fn run_challenge(
    registry: &ProviderRegistry,
    challengers: &[ModelRef],
    turn_id: &TurnId,
    question: &str,
    proposal: &str,
) -> ConsensusResult<Vec<Contribution>> {
    let calls = challengers.iter().enumerate().map(|(index, model)| {
        let model = model.clone();
        let framing = ChallengeFraming::for_index(index);
        let messages = vec![
            Message::system(system_prompt()),
            Message::user(user_prompt(question, proposal, framing)),
        ];
        let turn_id = turn_id.clone();
        async move {
            let response = registry.send(&model, &messages, &SendOptions::default()).await?;
            let descriptor = registry.descriptor(&model);
            let cost = descriptor
                .map(|d| d.estimate_cost(response.usage.input_tokens, response.usage.output_tokens))
                .unwrap_or(0.0);

            let mut contribution = Contribution::new(
                turn_id,
                model,
                ContributionRole::Challenger,
                response.content.clone(),
                response.usage.input_tokens,
                response.usage.output_tokens,
                cost,
                response.latency_ms,
            );
            contribution.framing = Some(framing);
            contribution.truncated = Some(response.truncated());
            contribution.sycophantic = Some(is_sycophantic(&response.content));
            Ok::<Contribution, ConsensusError>(contribution)
        }
    });

    let results = join_all(calls).await;
    let successes: Vec<Contribution> = results.into_iter().filter_map(Result::ok).collect();

    if successes.is_empty() {
        return Err(ConsensusError::InsufficientModels(
            "all challengers failed in this round".to_string(),
        ));
    }

    Ok(successes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framings_rotate_round_robin_across_four_challengers() {
        let framings: Vec<ChallengeFraming> = (0..4).map(ChallengeFraming::for_index).collect();
        assert_eq!(
            framings,
            vec![
                ChallengeFraming::Flaw,
                ChallengeFraming::Alternative,
                ChallengeFraming::Risk,
                ChallengeFraming::DevilsAdvocate,
            ]
        );
    }

    #[test]
    fn prompt_instructs_against_leading_praise() {
        let prompt = system_prompt();
        assert!(prompt.contains("Do not start with praise"));
    }
}
