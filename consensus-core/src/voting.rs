//! Voting engine (§4.8): the alternate, non-state-machine protocol. Every
//! configured model answers independently; a judge model (cheapest by input
//! cost) selects or synthesizes the winning answer.

use std::collections::HashSet;

use futures::future::join_all;

use crate::classifier;
use crate::error::{ConsensusError, ConsensusResult};
use crate::model::{domain_cap, Intent, ModelRef};
use crate::persistence::types::Vote;
use crate::provider::{Message, ProviderRegistry, SelectionRole, SendOptions};

/// Rigor penalty applied when fewer than two distinct providers
/// participated (§4.8); the Design Notes leave the exact magnitude
/// unspecified, so this is pinned as a fixed constant.
pub const SINGLE_PROVIDER_RIGOR_PENALTY: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingAggregation {
    Majority,
    Weighted,
}

pub struct VotingOutcome {
    pub decision_text: String,
    pub rigor: f64,
    pub confidence: f64,
    pub votes: Vec<Vote>,
    pub cost: f64,
}

/// Fans out `question` to every model in `panel`, persists each answer as a
/// Vote (caller-side persistence), then asks the judge model to pick
/// (majority) or synthesize (weighted) the final answer.
pub async fn run_voting(
    registry: &ProviderRegistry,
    thread_id: &str,
    question: &str,
    panel: &[ModelRef],
    aggregation: VotingAggregation,
    intent: Intent,
) -> ConsensusResult<VotingOutcome> {
    if panel.len() < 2 {
        return Err(ConsensusError::InsufficientModels(
            "voting requires at least two panel models".to_string(),
        ));
    }

    let options = SendOptions::default();
    let calls = panel.iter().map(|model| {
        let model = model.clone();
        let messages = vec![Message::user(question)];
        let options = options.clone();
        async move {
            let response = registry.send(&model, &messages, &options).await;
            (model, response)
        }
    });

    let results = join_all(calls).await;

    let mut votes = Vec::new();
    let mut distinct_providers: HashSet<&str> = HashSet::new();
    let mut cost = 0.0;

    for (model, result) in &results {
        if let Ok(response) = result {
            let descriptor = registry.descriptor(model);
            let vote_cost = descriptor
                .map(|d| d.estimate_cost(response.usage.input_tokens, response.usage.output_tokens))
                .unwrap_or(0.0);
            cost += vote_cost;
            distinct_providers.insert(model.provider());
            votes.push(Vote {
                thread_id: thread_id.to_string(),
                model_ref: model.clone(),
                content: response.content.clone(),
                cost: vote_cost,
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
                created_at: chrono::Utc::now(),
            });
        }
    }

    if votes.len() < 2 {
        return Err(ConsensusError::InsufficientModels(
            "fewer than two models returned a usable vote".to_string(),
        ));
    }

    let judge = registry.select(SelectionRole::Cheapest, &[])?;
    let decision_text = match aggregation {
        VotingAggregation::Majority => select_best(registry, &judge, question, &votes).await?,
        VotingAggregation::Weighted => synthesize_weighted(registry, &judge, question, &votes).await?,
    };

    let rigor = if distinct_providers.len() < 2 {
        (1.0 - SINGLE_PROVIDER_RIGOR_PENALTY).max(0.0)
    } else {
        1.0
    };
    let confidence = domain_cap(intent).min(rigor);

    Ok(VotingOutcome {
        decision_text,
        rigor,
        confidence,
        votes,
        cost,
    })
}

async fn select_best(
    registry: &ProviderRegistry,
    judge: &ModelRef,
    question: &str,
    votes: &[Vote],
) -> ConsensusResult<String> {
    let mut prompt = format!(
        "Question: {question}\n\nSeveral independent models answered. Pick the single best \
         answer verbatim and reply with only that answer's text, nothing else.\n\n"
    );
    for vote in votes {
        prompt.push_str(&format!("--- {} ---\n{}\n\n", vote.model_ref, vote.content));
    }
    let messages = vec![Message::user(prompt)];
    let response = registry.send(judge, &messages, &SendOptions::default()).await?;
    Ok(response.content)
}

async fn synthesize_weighted(
    registry: &ProviderRegistry,
    judge: &ModelRef,
    question: &str,
    votes: &[Vote],
) -> ConsensusResult<String> {
    let mut prompt = format!(
        "Question: {question}\n\nSeveral independent models answered. Synthesize a single best \
         answer, weighting more capable (higher-cost) contributors more heavily, but do not \
         discard a correct point made only by a cheaper model.\n\n"
    );
    for vote in votes {
        let weight = registry
            .descriptor(&vote.model_ref)
            .map(|d| d.output_cost_per_million)
            .unwrap_or(0.0);
        prompt.push_str(&format!(
            "--- {} (weight={:.2}) ---\n{}\n\n",
            vote.model_ref, weight, vote.content
        ));
    }
    let messages = vec![Message::user(prompt)];
    let response = registry.send(judge, &messages, &SendOptions::default()).await?;
    Ok(response.content)
}

/// Classifies whether `question` should route to voting at all, per §4.11.
pub async fn should_vote(registry: &ProviderRegistry, question: &str) -> ConsensusResult<bool> {
    let choice = classifier::classify_protocol(registry, question).await?;
    Ok(choice == classifier::ProtocolChoice::Judgment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_provider_rigor_is_penalized() {
        let penalized = 1.0 - SINGLE_PROVIDER_RIGOR_PENALTY;
        assert!(penalized < 1.0);
        assert!(penalized >= 0.5);
    }

    #[test]
    fn confidence_never_exceeds_domain_cap() {
        let rigor = 1.0;
        let confidence = domain_cap(Intent::Strategic).min(rigor);
        assert_eq!(confidence, 0.70);
    }
}
