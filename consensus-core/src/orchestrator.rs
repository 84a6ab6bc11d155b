//! Orchestrator entry point (§6): drives one Thread through the consensus
//! state machine, or through the voting/decomposition alternates, wiring
//! together the provider registry, persistence, the event bus, and the
//! phase handlers.

use tracing::{info, instrument};

use crate::classifier::{self, ProtocolChoice};
use crate::config::{OrchestratorConfig, Protocol};
use crate::context_builder;
use crate::convergence::has_converged;
use crate::decomposition::{self, SubtaskResult, SubtaskSpec, SynthesisStrategy};
use crate::error::{ConsensusError, ConsensusResult};
use crate::events::{ConsensusEvent, EventBus};
use crate::model::{Intent, ModelRef};
use crate::persistence::{
    ChallengeFraming, Decision, Persistence, Subtask, Taxonomy, Thread, ThreadStatus, Turn,
};
use crate::phases::{run_challenge, run_commit, run_decompose, run_propose, run_revise};
use crate::provider::{Message, ProviderRegistry, SelectionRole, SendOptions};
use crate::state_machine::{Phase, RunContext};
use crate::voting::{self, VotingAggregation};

/// Request shape for [`run_thread`] (§6 "Orchestrator entry point").
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub protocol: Protocol,
    pub max_rounds: u32,
    pub decompose: bool,
    pub panel: Vec<ModelRef>,
    pub proposer: Option<ModelRef>,
    pub challengers: Option<Vec<ModelRef>>,
    pub convergence_threshold: f64,
    pub voting_aggregation: VotingAggregation,
}

impl RunOptions {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            protocol: config.general.protocol,
            max_rounds: config.general.max_rounds,
            decompose: config.general.decompose,
            panel: config.consensus.panel.clone(),
            proposer: None,
            challengers: None,
            convergence_threshold: config.consensus.convergence_threshold,
            voting_aggregation: config.voting.aggregation.into(),
        }
    }
}

/// Response shape for [`run_thread`] (§6).
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub thread_id: String,
    pub decision_text: String,
    pub rigor: f64,
    pub confidence: f64,
    pub dissent: Option<String>,
    pub cost_usd: f64,
    pub protocol_used: &'static str,
    pub truncated_phases: Vec<String>,
    pub rounds: u32,
}

/// Runs one Thread from question to final Decision, persisting every
/// entity along the way and publishing progress over `events`.
#[instrument(skip(registry, persistence, events, options), fields(question_len = question.len()))]
pub async fn run_thread(
    registry: &ProviderRegistry,
    persistence: &dyn Persistence,
    events: &EventBus,
    options: RunOptions,
    question: &str,
) -> ConsensusResult<RunOutcome> {
    let thread = Thread::new(question);
    persistence
        .create_thread(&thread)
        .await
        .map_err(|e| ConsensusError::Storage(e.to_string()))?;

    let _ = events.publish(ConsensusEvent::ThreadStarted {
        thread_id: thread.id.clone(),
        question: question.to_string(),
        timestamp: chrono::Utc::now(),
    });

    let cost_before = registry.total_cost();
    let result = run_thread_inner(registry, persistence, events, &options, &thread.id, question).await;
    let cost_usd = registry.total_cost() - cost_before;

    match &result {
        Ok(outcome) => {
            persistence
                .set_thread_status(&thread.id, ThreadStatus::Complete)
                .await
                .map_err(|e| ConsensusError::Storage(e.to_string()))?;
            let _ = events.publish(ConsensusEvent::ThreadComplete {
                thread_id: thread.id.clone(),
                decision_text: outcome.decision_text.clone(),
                timestamp: chrono::Utc::now(),
            });
            info!(thread_id = %thread.id, cost_usd, "thread complete");
        }
        Err(err) => {
            persistence
                .set_thread_status(&thread.id, ThreadStatus::Failed)
                .await
                .map_err(|e| ConsensusError::Storage(e.to_string()))?;
            let _ = events.publish(ConsensusEvent::Error {
                thread_id: thread.id.clone(),
                kind: error_kind(err),
                message: err.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    result.map(|mut outcome| {
        outcome.cost_usd = cost_usd;
        outcome
    })
}

async fn run_thread_inner(
    registry: &ProviderRegistry,
    persistence: &dyn Persistence,
    events: &EventBus,
    options: &RunOptions,
    thread_id: &str,
    question: &str,
) -> ConsensusResult<RunOutcome> {
    let protocol = resolve_protocol(registry, options.protocol, question).await?;

    if protocol == Protocol::Voting {
        return run_voting_branch(registry, persistence, events, options, thread_id, question).await;
    }

    if options.decompose {
        if let Some(subtasks) = run_decompose(registry, question).await? {
            return run_decomposition_branch(
                registry,
                persistence,
                events,
                options,
                thread_id,
                question,
                subtasks,
            )
            .await;
        }
        // Single-subtask optimization: fall through to plain consensus.
    }

    let (decision, rounds) =
        run_consensus_cycle(registry, persistence, events, options, thread_id, question).await?;

    Ok(RunOutcome {
        thread_id: thread_id.to_string(),
        decision_text: decision.content,
        rigor: decision.rigor,
        confidence: decision.confidence,
        dissent: decision.dissent,
        cost_usd: 0.0,
        protocol_used: "consensus",
        truncated_phases: Vec::new(),
        rounds,
    })
}

async fn resolve_protocol(
    registry: &ProviderRegistry,
    requested: Protocol,
    question: &str,
) -> ConsensusResult<Protocol> {
    match requested {
        Protocol::Auto => {
            let choice = classifier::classify_protocol(registry, question).await?;
            Ok(match choice {
                ProtocolChoice::Judgment => Protocol::Voting,
                ProtocolChoice::Reasoning => Protocol::Consensus,
            })
        }
        other => Ok(other),
    }
}

/// Drives PROPOSE → CHALLENGE → REVISE → COMMIT across rounds for one
/// question, stopping at convergence or round exhaustion (§4.4).
async fn run_consensus_cycle(
    registry: &ProviderRegistry,
    persistence: &dyn Persistence,
    events: &EventBus,
    options: &RunOptions,
    thread_id: &str,
    question: &str,
) -> ConsensusResult<(Decision, u32)> {
    let intent = classify_intent(registry, question).await.unwrap_or_default();

    let proposer = match &options.proposer {
        Some(model) => model.clone(),
        None => registry.select(SelectionRole::Proposer, &options.panel)?,
    };

    let mut ctx = RunContext::new(thread_id.to_string(), options.max_rounds.max(1));
    let mut last_decision: Option<Decision> = None;
    let mut previous_challenge_texts: Option<Vec<String>> = None;

    loop {
        ctx.transition(Phase::Propose, false, false, false, "begin round")
            .map_err(|e| ConsensusError::InvalidState(e.to_string()))?;
        let turn = Turn::new(thread_id.to_string(), ctx.current_round + 1);
        persistence
            .create_turn(&turn)
            .await
            .map_err(|e| ConsensusError::Storage(e.to_string()))?;

        let previous_round = ctx.history.last();
        let proposal = run_propose(registry, &proposer, &turn.id, question, previous_round).await?;
        persistence
            .add_contribution(&proposal)
            .await
            .map_err(|e| ConsensusError::Storage(e.to_string()))?;
        let _ = events.publish(ConsensusEvent::PhaseComplete {
            thread_id: thread_id.to_string(),
            phase: Phase::Propose,
            truncated: proposal.truncated.unwrap_or(false),
            timestamp: chrono::Utc::now(),
        });
        ctx.working_proposal = Some(proposal.clone());

        ctx.transition(Phase::Challenge, false, false, false, "proposal complete")
            .map_err(|e| ConsensusError::InvalidState(e.to_string()))?;
        let challengers = match &options.challengers {
            Some(models) if !models.is_empty() => models.clone(),
            _ => registry.select_challengers(&proposer, 2, &options.panel),
        };
        let challenges =
            run_challenge(registry, &challengers, &turn.id, question, &proposal.content).await?;
        for challenge in &challenges {
            persistence
                .add_contribution(challenge)
                .await
                .map_err(|e| ConsensusError::Storage(e.to_string()))?;
            let _ = events.publish(ConsensusEvent::Challenge {
                thread_id: thread_id.to_string(),
                model_ref: challenge.model_ref.clone(),
                sycophantic: challenge.sycophantic.unwrap_or(false),
                framing: challenge.framing.unwrap_or(ChallengeFraming::Flaw),
                truncated: challenge.truncated.unwrap_or(false),
                timestamp: chrono::Utc::now(),
            });
        }
        ctx.working_challenges = challenges.clone();

        ctx.transition(Phase::Revise, false, false, false, "challenges complete")
            .map_err(|e| ConsensusError::InvalidState(e.to_string()))?;
        let revision =
            run_revise(registry, &proposer, &turn.id, question, &proposal.content, &challenges)
                .await?;
        persistence
            .add_contribution(&revision)
            .await
            .map_err(|e| ConsensusError::Storage(e.to_string()))?;
        ctx.working_revision = Some(revision.clone());

        ctx.transition(Phase::Commit, false, false, false, "revision complete")
            .map_err(|e| ConsensusError::InvalidState(e.to_string()))?;
        let decision = run_commit(&turn.id, &revision, &challenges, intent, Taxonomy {
            intent: Some(intent),
            ..Taxonomy::default()
        });
        persistence
            .save_decision(&decision)
            .await
            .map_err(|e| ConsensusError::Storage(e.to_string()))?;
        let _ = events.publish(ConsensusEvent::Commit {
            thread_id: thread_id.to_string(),
            rigor: decision.rigor,
            confidence: decision.confidence,
            dissent: decision.dissent.clone(),
            timestamp: chrono::Utc::now(),
        });
        ctx.pending_decision = Some(decision.clone());

        let current_texts: Vec<String> = challenges.iter().map(|c| c.content.clone()).collect();
        let converged = has_converged(
            previous_challenge_texts.as_deref(),
            &current_texts,
            options.convergence_threshold,
        );
        let rounds_exhausted = ctx.current_round + 1 >= ctx.max_rounds;

        let _ = events.publish(ConsensusEvent::RoundComplete {
            thread_id: thread_id.to_string(),
            round_number: ctx.current_round + 1,
            cumulative_cost: registry.total_cost(),
            timestamp: chrono::Utc::now(),
        });

        last_decision = Some(decision);
        previous_challenge_texts = Some(current_texts);

        if converged || rounds_exhausted {
            ctx.transition(Phase::Complete, false, converged, rounds_exhausted, "terminal")
                .map_err(|e| ConsensusError::InvalidState(e.to_string()))?;
            break;
        }
        ctx.transition(Phase::Propose, false, converged, rounds_exhausted, "next round")
            .map_err(|e| ConsensusError::InvalidState(e.to_string()))?;
    }

    let rounds = ctx.current_round + 1;
    let decision = last_decision
        .ok_or_else(|| ConsensusError::InvalidState("consensus cycle produced no decision".to_string()))?;
    Ok((decision, rounds))
}

async fn run_voting_branch(
    registry: &ProviderRegistry,
    persistence: &dyn Persistence,
    events: &EventBus,
    options: &RunOptions,
    thread_id: &str,
    question: &str,
) -> ConsensusResult<RunOutcome> {
    let intent = classify_intent(registry, question).await.unwrap_or_default();
    let panel = if options.panel.is_empty() {
        registry.all_descriptors().iter().map(|d| d.reference.clone()).collect()
    } else {
        options.panel.clone()
    };

    let _ = events.publish(ConsensusEvent::PhaseStarted {
        thread_id: thread_id.to_string(),
        phase: Phase::Propose,
        model_ref: None,
        timestamp: chrono::Utc::now(),
    });

    let outcome = voting::run_voting(
        registry,
        thread_id,
        question,
        &panel,
        options.voting_aggregation,
        intent,
    )
    .await?;

    for vote in &outcome.votes {
        persistence
            .save_vote(vote)
            .await
            .map_err(|e| ConsensusError::Storage(e.to_string()))?;
    }

    Ok(RunOutcome {
        thread_id: thread_id.to_string(),
        decision_text: outcome.decision_text,
        rigor: outcome.rigor,
        confidence: outcome.confidence,
        dissent: None,
        cost_usd: 0.0,
        protocol_used: "voting",
        truncated_phases: Vec::new(),
        rounds: 1,
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_decomposition_branch(
    registry: &ProviderRegistry,
    persistence: &dyn Persistence,
    events: &EventBus,
    options: &RunOptions,
    thread_id: &str,
    question: &str,
    subtasks: Vec<SubtaskSpec>,
) -> ConsensusResult<RunOutcome> {
    let _ = events.publish(ConsensusEvent::PhaseStarted {
        thread_id: thread_id.to_string(),
        phase: Phase::Decompose,
        model_ref: None,
        timestamp: chrono::Utc::now(),
    });

    let results = decomposition::run_scheduler(&subtasks, |spec, _deps| {
        let registry = registry;
        let persistence = persistence;
        let events = events;
        let options = options.clone();
        let thread_id = thread_id.to_string();
        async move {
            let sub_question = format!("{question}\n\nSubtask: {}", spec.description);
            let (decision, _rounds) =
                run_consensus_cycle(registry, persistence, events, &options, &thread_id, &sub_question)
                    .await?;
            Ok(SubtaskResult {
                label: spec.label,
                content: decision.content,
                rigor: decision.rigor,
                confidence: decision.confidence,
                cost: 0.0,
            })
        }
    })
    .await?;

    let persisted_subtasks: Vec<Subtask> = results
        .iter()
        .zip(subtasks.iter())
        .map(|(result, spec)| {
            let mut subtask = Subtask::new(
                thread_id.to_string(),
                spec.label.clone(),
                spec.description.clone(),
                spec.depends_on.clone(),
            );
            subtask.result = Some(result.content.clone());
            subtask.cost = result.cost;
            subtask
        })
        .collect();
    persistence
        .save_subtasks(&persisted_subtasks)
        .await
        .map_err(|e| ConsensusError::Storage(e.to_string()))?;

    let (decision_text, synthesis_cost) =
        decomposition::synthesize(registry, question, &results, SynthesisStrategy::Prioritize).await?;

    let avg_rigor = results.iter().map(|r| r.rigor).sum::<f64>() / results.len().max(1) as f64;
    let avg_confidence = results.iter().map(|r| r.confidence).sum::<f64>() / results.len().max(1) as f64;

    Ok(RunOutcome {
        thread_id: thread_id.to_string(),
        decision_text,
        rigor: avg_rigor,
        confidence: avg_confidence,
        dissent: None,
        cost_usd: synthesis_cost,
        protocol_used: "consensus",
        truncated_phases: Vec::new(),
        rounds: 1,
    })
}

/// Classifies the question's intent for the domain confidence cap (§4.5
/// Calibration). A single cheap-model call, separate from the
/// reasoning/judgment protocol classifier.
async fn classify_intent(registry: &ProviderRegistry, question: &str) -> ConsensusResult<Intent> {
    let model = registry.select(SelectionRole::Cheapest, &[])?;
    let messages = vec![
        Message::system(
            "Classify the question's dominant character as exactly one word: factual, \
             technical, creative, judgment, or strategic.",
        ),
        Message::user(question),
    ];
    let options = SendOptions {
        temperature: 0.0,
        max_output_tokens: Some(8),
        ..Default::default()
    };
    let response = registry.send(&model, &messages, &options).await?;
    let normalized = response.content.trim().to_lowercase();
    Ok(if normalized.contains("factual") {
        Intent::Factual
    } else if normalized.contains("technical") {
        Intent::Technical
    } else if normalized.contains("creative") {
        Intent::Creative
    } else if normalized.contains("judgment") {
        Intent::Judgment
    } else if normalized.contains("strategic") {
        Intent::Strategic
    } else {
        Intent::Default
    })
}

fn error_kind(err: &ConsensusError) -> String {
    match err {
        ConsensusError::ProviderAuth { .. } => "provider_auth",
        ConsensusError::ProviderRateLimited { .. } => "provider_rate_limited",
        ConsensusError::ProviderTimeout { .. } => "provider_timeout",
        ConsensusError::ProviderOverloaded { .. } => "provider_overloaded",
        ConsensusError::ModelNotFound(_) => "model_not_found",
        ConsensusError::CostLimitExceeded { .. } => "cost_limit_exceeded",
        ConsensusError::InsufficientModels(_) => "insufficient_models",
        ConsensusError::InvalidState(_) => "invalid_state",
        ConsensusError::DecomposeInvalid(_) => "decompose_invalid",
        ConsensusError::Storage(_) => "storage",
        ConsensusError::Other(_) => "other",
    }
    .to_string()
}

/// Rebuilds a bounded context block for a follow-up question in an existing
/// Thread, per §4.12.
pub async fn build_thread_context(
    persistence: &dyn Persistence,
    thread_id: &str,
) -> ConsensusResult<String> {
    let history = persistence
        .get_thread_with_history(thread_id)
        .await
        .map_err(|e| ConsensusError::Storage(e.to_string()))?;

    let mut decisions = history.decisions;
    decisions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(context_builder::build_context(
        history.thread_summary.as_ref(),
        &decisions,
        &history.outcomes,
        context_builder::DEFAULT_TOKEN_BUDGET,
    ))
}

