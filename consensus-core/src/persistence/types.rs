//! Persisted entity types (§3 DATA MODEL).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Intent, ModelRef};

pub type ThreadId = String;
pub type TurnId = String;
pub type ContributionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Complete,
    Failed,
}

/// One debate session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub question: String,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            question: question.into(),
            status: ThreadStatus::Active,
            created_at: Utc::now(),
        }
    }
}

/// One round within a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub thread_id: ThreadId,
    /// 1-based, unique and contiguous within a thread (§3 invariant 2).
    pub round_number: u32,
    pub terminal_state: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(thread_id: ThreadId, round_number: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id,
            round_number,
            terminal_state: String::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionRole {
    Proposer,
    Challenger,
    Reviser,
    Decomposer,
    Judge,
    Summarizer,
    Classifier,
}

/// Which of the four challenge framings (§4.5) produced a Contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeFraming {
    Flaw,
    Alternative,
    Risk,
    DevilsAdvocate,
}

impl ChallengeFraming {
    pub const ROTATION: [ChallengeFraming; 4] = [
        ChallengeFraming::Flaw,
        ChallengeFraming::Alternative,
        ChallengeFraming::Risk,
        ChallengeFraming::DevilsAdvocate,
    ];

    pub fn for_index(index: usize) -> Self {
        Self::ROTATION[index % Self::ROTATION.len()]
    }
}

/// One model utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub turn_id: TurnId,
    pub model_ref: ModelRef,
    pub role: ContributionRole,
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub latency_ms: u64,
    pub framing: Option<ChallengeFraming>,
    pub sycophantic: Option<bool>,
    pub truncated: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Contribution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        turn_id: TurnId,
        model_ref: ModelRef,
        role: ContributionRole,
        content: impl Into<String>,
        input_tokens: u32,
        output_tokens: u32,
        cost: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            turn_id,
            model_ref,
            role,
            content: content.into(),
            input_tokens,
            output_tokens,
            cost,
            latency_ms,
            framing: None,
            sycophantic: None,
            truncated: None,
            created_at: Utc::now(),
        }
    }
}

/// Classification tags attached to a Decision, if the classifier ran (§4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Taxonomy {
    pub intent: Option<Intent>,
    pub category: Option<String>,
    pub genus: Option<String>,
    pub complexity: Option<String>,
}

/// The committed answer for a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub turn_id: TurnId,
    pub content: String,
    pub rigor: f64,
    pub confidence: f64,
    pub dissent: Option<String>,
    pub taxonomy: Taxonomy,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Success,
    Partial,
    Failure,
    Unknown,
}

/// User-supplied feedback on a Decision after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: String,
    pub thread_id: ThreadId,
    pub result: OutcomeResult,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Outcome {
    pub fn new(thread_id: ThreadId, result: OutcomeResult, notes: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id,
            result,
            notes,
            created_at: Utc::now(),
        }
    }
}

/// A node in the decomposition DAG (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub thread_id: ThreadId,
    /// Unique within the parent decomposition run.
    pub label: String,
    pub description: String,
    pub depends_on: Vec<String>,
    pub result: Option<String>,
    pub cost: f64,
}

impl Subtask {
    pub fn new(thread_id: ThreadId, label: impl Into<String>, description: impl Into<String>, depends_on: Vec<String>) -> Self {
        Self {
            thread_id,
            label: label.into(),
            description: description.into(),
            depends_on,
            result: None,
            cost: 0.0,
        }
    }
}

/// One model's independent answer in the voting protocol (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub thread_id: ThreadId,
    pub model_ref: ModelRef,
    pub content: String,
    pub cost: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub created_at: DateTime<Utc>,
}

/// A regenerated (not appended) summary for a Turn or a Thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub owner_id: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(owner_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            content: content.into(),
            updated_at: Utc::now(),
        }
    }
}

/// A Thread plus the Turns/Contributions/Decisions/Summaries needed to
/// rebuild run context, returned by `get_thread_with_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadHistory {
    pub thread: Thread,
    pub turns: Vec<Turn>,
    pub contributions: Vec<Contribution>,
    pub decisions: Vec<Decision>,
    pub outcomes: Vec<Outcome>,
    pub thread_summary: Option<Summary>,
    pub turn_summaries: Vec<Summary>,
}
