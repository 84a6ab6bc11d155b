//! Orchestrator integration tests — exercises the full consensus and
//! voting protocols end to end against [`ScriptedAdapter`], with no real
//! network calls.

use std::sync::Arc;

use consensus_core::config::{Protocol, VotingAggregationConfig};
use consensus_core::events::EventBus;
use consensus_core::model::{ModelDescriptor, ModelRef};
use consensus_core::orchestrator::{run_thread, RunOptions};
use consensus_core::persistence::InMemoryPersistence;
use consensus_core::provider::adapter::{AdapterResponse, FinishReason, Usage};
use consensus_core::provider::scripted::{Scripted, ScriptedAdapter};
use consensus_core::provider::{ProviderRegistry, RetryPolicy};
use consensus_core::voting::VotingAggregation;

fn descriptor(m: &ModelRef, input_cost: f64, output_cost: f64, proposer_eligible: bool) -> ModelDescriptor {
    ModelDescriptor {
        reference: m.clone(),
        context_window: 32_000,
        max_output_tokens: 4096,
        input_cost_per_million: input_cost,
        output_cost_per_million: output_cost,
        supports_tools: false,
        supports_streaming: false,
        proposer_eligible,
    }
}

fn canned(content: &str) -> Scripted {
    Scripted::Response(AdapterResponse {
        content: content.to_string(),
        usage: Usage {
            input_tokens: 50,
            output_tokens: 50,
            cached_input_tokens: None,
        },
        finish_reason: FinishReason::Stop,
        latency_ms: 5,
        tool_calls: vec![],
    })
}

async fn registry_with_proposer_and_two_challengers() -> (ProviderRegistry, Arc<ScriptedAdapter>, Arc<ScriptedAdapter>) {
    let proposer = ModelRef::new("acme", "big");
    let critic_a = ModelRef::new("beta", "critic-a");
    let critic_b = ModelRef::new("beta", "critic-b");

    let acme = Arc::new(ScriptedAdapter::new(
        "acme",
        vec![descriptor(&proposer, 5.0, 15.0, true)],
    ));
    let beta = Arc::new(ScriptedAdapter::new(
        "beta",
        vec![
            descriptor(&critic_a, 0.5, 1.0, false),
            descriptor(&critic_b, 0.5, 1.0, false),
        ],
    ));

    let mut registry = ProviderRegistry::new(0.0, RetryPolicy::default());
    registry.register(acme.clone() as Arc<dyn consensus_core::provider::ProviderAdapter>).await.unwrap();
    registry.register(beta.clone() as Arc<dyn consensus_core::provider::ProviderAdapter>).await.unwrap();

    (registry, acme, beta)
}

#[tokio::test]
async fn consensus_single_round_with_two_genuine_challengers() {
    let (registry, acme, beta) = registry_with_proposer_and_two_challengers().await;
    let proposer = ModelRef::new("acme", "big");
    let critic_a = ModelRef::new("beta", "critic-a");
    let critic_b = ModelRef::new("beta", "critic-b");

    // beta:critic-a is the cheapest model, so it answers the intent
    // classification call before taking its challenger turn.
    beta.push(&critic_a, canned("strategic"));
    beta.push(&critic_a, canned("missed failure modes"));
    beta.push(&critic_b, canned("team size argues against this"));
    acme.push(&proposer, canned("use microservices carefully"));
    acme.push(&proposer, canned("use microservices, staffed by a platform team"));

    let persistence = InMemoryPersistence::new();
    let events = EventBus::new();
    let options = RunOptions {
        protocol: Protocol::Consensus,
        max_rounds: 1,
        decompose: false,
        panel: vec![],
        proposer: None,
        challengers: None,
        convergence_threshold: 0.7,
        voting_aggregation: VotingAggregation::Majority,
    };

    let outcome = run_thread(&registry, &persistence, &events, options, "should we use microservices?")
        .await
        .unwrap();

    assert_eq!(outcome.protocol_used, "consensus");
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.rigor, 1.0);
    assert_eq!(outcome.confidence, 0.70);
    assert_eq!(outcome.decision_text, "use microservices, staffed by a platform team");
    assert!(outcome.dissent.unwrap().contains("missed failure modes"));

    let history = persistence.get_thread_with_history(&outcome.thread_id).await.unwrap();
    assert_eq!(history.decisions.len(), 1);
    assert_eq!(history.turns.len(), 1);
}

#[tokio::test]
async fn sycophantic_challenge_reduces_rigor_to_three_quarters() {
    let (registry, acme, beta) = registry_with_proposer_and_two_challengers().await;
    let proposer = ModelRef::new("acme", "big");
    let critic_a = ModelRef::new("beta", "critic-a");
    let critic_b = ModelRef::new("beta", "critic-b");

    beta.push(&critic_a, canned("strategic"));
    beta.push(&critic_a, canned("Great proposal, I have nothing to add."));
    beta.push(&critic_b, canned("this underestimates operational cost"));
    acme.push(&proposer, canned("use microservices"));
    acme.push(&proposer, canned("use microservices with a cost review"));

    let persistence = InMemoryPersistence::new();
    let events = EventBus::new();
    let options = RunOptions {
        protocol: Protocol::Consensus,
        max_rounds: 1,
        decompose: false,
        panel: vec![],
        proposer: None,
        challengers: None,
        convergence_threshold: 0.7,
        voting_aggregation: VotingAggregation::Majority,
    };

    let outcome = run_thread(&registry, &persistence, &events, options, "should we use microservices?")
        .await
        .unwrap();

    assert!((outcome.rigor - 0.75).abs() < 1e-9);
    let dissent = outcome.dissent.unwrap();
    assert!(dissent.contains("operational cost"));
    assert!(!dissent.contains("Great proposal"));
}

#[tokio::test]
async fn voting_protocol_picks_cheapest_judge_and_persists_votes() {
    let voter_a = ModelRef::new("acme", "alpha");
    let voter_b = ModelRef::new("acme", "beta-model");
    let judge = ModelRef::new("acme", "judge");

    let adapter = Arc::new(ScriptedAdapter::new(
        "acme",
        vec![
            descriptor(&voter_a, 3.0, 6.0, false),
            descriptor(&voter_b, 3.0, 6.0, false),
            descriptor(&judge, 0.1, 0.2, false),
        ],
    ));
    adapter.push(&voter_a, canned("42"));
    adapter.push(&voter_b, canned("forty-two"));
    // The judge is also the cheapest model, so it answers (in order): the
    // orchestrator's intent classification call, its own panel vote, and
    // finally the judge-selection call `run_voting` makes afterward.
    adapter.push(&judge, canned("42"));
    adapter.push(&judge, canned("42"));
    adapter.push(&judge, canned("42"));

    let mut registry = ProviderRegistry::new(0.0, RetryPolicy::default());
    registry.register(adapter.clone() as Arc<dyn consensus_core::provider::ProviderAdapter>).await.unwrap();

    let persistence = InMemoryPersistence::new();
    let events = EventBus::new();
    let options = RunOptions {
        protocol: Protocol::Voting,
        max_rounds: 3,
        decompose: false,
        panel: vec![voter_a.clone(), voter_b.clone(), judge.clone()],
        proposer: None,
        challengers: None,
        convergence_threshold: 0.7,
        voting_aggregation: VotingAggregationConfig::Majority.into(),
    };

    let outcome = run_thread(&registry, &persistence, &events, options, "what is the answer?")
        .await
        .unwrap();

    assert_eq!(outcome.protocol_used, "voting");
    assert_eq!(outcome.decision_text, "42");

    let history = persistence.get_thread_with_history(&outcome.thread_id).await.unwrap();
    assert_eq!(history.thread.status, consensus_core::persistence::ThreadStatus::Complete);
}
