//! Events emitted by the orchestrator for transports to stream to clients
//! (§6 "Emitted events"). Ordered per Thread; consumers receive them as a
//! linear stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ModelRef;
use crate::persistence::types::ChallengeFraming;
use crate::state_machine::Phase;

pub type EventId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsensusEvent {
    ThreadStarted {
        thread_id: String,
        question: String,
        timestamp: DateTime<Utc>,
    },

    PhaseStarted {
        thread_id: String,
        phase: Phase,
        model_ref: Option<ModelRef>,
        timestamp: DateTime<Utc>,
    },

    /// An incremental streaming delta of a phase's model output.
    PhaseContent {
        thread_id: String,
        phase: Phase,
        delta: String,
        timestamp: DateTime<Utc>,
    },

    Challenge {
        thread_id: String,
        model_ref: ModelRef,
        sycophantic: bool,
        framing: ChallengeFraming,
        truncated: bool,
        timestamp: DateTime<Utc>,
    },

    PhaseComplete {
        thread_id: String,
        phase: Phase,
        truncated: bool,
        timestamp: DateTime<Utc>,
    },

    Commit {
        thread_id: String,
        rigor: f64,
        confidence: f64,
        dissent: Option<String>,
        timestamp: DateTime<Utc>,
    },

    RoundComplete {
        thread_id: String,
        round_number: u32,
        cumulative_cost: f64,
        timestamp: DateTime<Utc>,
    },

    ThreadComplete {
        thread_id: String,
        decision_text: String,
        timestamp: DateTime<Utc>,
    },

    Error {
        thread_id: String,
        kind: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ConsensusEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            ConsensusEvent::ThreadStarted { thread_id, .. }
            | ConsensusEvent::PhaseStarted { thread_id, .. }
            | ConsensusEvent::PhaseContent { thread_id, .. }
            | ConsensusEvent::Challenge { thread_id, .. }
            | ConsensusEvent::PhaseComplete { thread_id, .. }
            | ConsensusEvent::Commit { thread_id, .. }
            | ConsensusEvent::RoundComplete { thread_id, .. }
            | ConsensusEvent::ThreadComplete { thread_id, .. }
            | ConsensusEvent::Error { thread_id, .. } => thread_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ConsensusEvent::ThreadStarted { .. } => "thread_started",
            ConsensusEvent::PhaseStarted { .. } => "phase_started",
            ConsensusEvent::PhaseContent { .. } => "phase_content",
            ConsensusEvent::Challenge { .. } => "challenge",
            ConsensusEvent::PhaseComplete { .. } => "phase_complete",
            ConsensusEvent::Commit { .. } => "commit",
            ConsensusEvent::RoundComplete { .. } => "round_complete",
            ConsensusEvent::ThreadComplete { .. } => "thread_complete",
            ConsensusEvent::Error { .. } => "error",
        }
    }

    pub fn new_id() -> EventId {
        uuid::Uuid::new_v4().to_string()
    }
}
