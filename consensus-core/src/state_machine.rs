//! Orchestrator state machine (§4.4): states, guarded transitions, and a
//! mutable run context threaded through a Thread's rounds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persistence::types::{Contribution, Decision};

/// A phase of the consensus state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Decompose,
    Propose,
    Challenge,
    Revise,
    Commit,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether `to` is a legal transition out of `self`, per §4.4's table.
    /// `decompose_requested`/`converged`/`rounds_exhausted` resolve the
    /// conditional edges out of IDLE and COMMIT.
    pub fn can_transition_to(
        self,
        to: Phase,
        decompose_requested: bool,
        converged: bool,
        rounds_exhausted: bool,
    ) -> bool {
        if to == Phase::Failed {
            return !self.is_terminal();
        }
        match (self, to) {
            (Phase::Idle, Phase::Propose) => !decompose_requested,
            (Phase::Idle, Phase::Decompose) => decompose_requested,
            (Phase::Decompose, Phase::Propose) => true,
            (Phase::Propose, Phase::Challenge) => true,
            (Phase::Challenge, Phase::Revise) => true,
            (Phase::Revise, Phase::Commit) => true,
            (Phase::Commit, Phase::Propose) => !converged && !rounds_exhausted,
            (Phase::Commit, Phase::Complete) => converged || rounds_exhausted,
            _ => false,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Decompose => "decompose",
            Self::Propose => "propose",
            Self::Challenge => "challenge",
            Self::Revise => "revise",
            Self::Commit => "commit",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: Phase,
    pub to: Phase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transition {} -> {}: {}", self.from, self.to, self.reason)
    }
}

impl std::error::Error for TransitionError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Frozen snapshot of one completed round, archived on COMMIT → PROPOSE
/// (§4.4 "On COMMIT→PROPOSE...").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_number: u32,
    pub proposal: Contribution,
    pub challenges: Vec<Contribution>,
    pub revision: Contribution,
    pub decision: Decision,
}

/// Mutable run context for a single Thread, carried across phases and
/// rounds by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub thread_id: String,
    pub phase: Phase,
    pub current_round: u32,
    pub max_rounds: u32,
    pub history: Vec<RoundRecord>,
    pub transitions: Vec<PhaseTransition>,
    /// Working (not-yet-archived) fields for the in-progress round.
    pub working_proposal: Option<Contribution>,
    pub working_challenges: Vec<Contribution>,
    pub working_revision: Option<Contribution>,
    pub pending_decision: Option<Decision>,
    pub cumulative_cost: f64,
}

impl RunContext {
    pub fn new(thread_id: impl Into<String>, max_rounds: u32) -> Self {
        Self {
            thread_id: thread_id.into(),
            phase: Phase::Idle,
            current_round: 0,
            max_rounds,
            history: Vec::new(),
            transitions: Vec::new(),
            working_proposal: None,
            working_challenges: Vec::new(),
            working_revision: None,
            pending_decision: None,
            cumulative_cost: 0.0,
        }
    }

    pub fn transition(
        &mut self,
        to: Phase,
        decompose_requested: bool,
        converged: bool,
        rounds_exhausted: bool,
        reason: impl Into<String>,
    ) -> Result<(), TransitionError> {
        if !self
            .phase
            .can_transition_to(to, decompose_requested, converged, rounds_exhausted)
        {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: "not a permitted edge for the current guard state".to_string(),
            });
        }

        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.into(),
        });

        if self.phase == Phase::Commit && to == Phase::Propose {
            self.archive_round()?;
            self.current_round += 1;
        }

        self.phase = to;
        Ok(())
    }

    fn archive_round(&mut self) -> Result<(), TransitionError> {
        let proposal = self.working_proposal.take().ok_or_else(|| TransitionError {
            from: Phase::Commit,
            to: Phase::Propose,
            reason: "missing working proposal at archival".to_string(),
        })?;
        let revision = self.working_revision.take().ok_or_else(|| TransitionError {
            from: Phase::Commit,
            to: Phase::Propose,
            reason: "missing working revision at archival".to_string(),
        })?;
        let decision = self.pending_decision.take().ok_or_else(|| TransitionError {
            from: Phase::Commit,
            to: Phase::Propose,
            reason: "missing decision at archival".to_string(),
        })?;

        self.history.push(RoundRecord {
            round_number: self.current_round,
            proposal,
            challenges: std::mem::take(&mut self.working_challenges),
            revision,
            decision,
        });
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelRef;
    use crate::persistence::types::{ContributionRole, Taxonomy};

    fn contribution(role: ContributionRole) -> Contribution {
        Contribution::new(
            "turn-1".to_string(),
            ModelRef::new("acme", "big"),
            role,
            "text",
            10,
            10,
            0.001,
            50,
        )
    }

    fn decision() -> Decision {
        Decision {
            turn_id: "turn-1".to_string(),
            content: "final".to_string(),
            rigor: 0.8,
            confidence: 0.8,
            dissent: None,
            taxonomy: Taxonomy::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn idle_requires_decompose_flag_to_pick_edge() {
        assert!(Phase::Idle.can_transition_to(Phase::Propose, false, false, false));
        assert!(!Phase::Idle.can_transition_to(Phase::Decompose, false, false, false));
        assert!(Phase::Idle.can_transition_to(Phase::Decompose, true, false, false));
        assert!(!Phase::Idle.can_transition_to(Phase::Propose, true, false, false));
    }

    #[test]
    fn commit_edge_depends_on_convergence_and_round_budget() {
        assert!(Phase::Commit.can_transition_to(Phase::Propose, false, false, false));
        assert!(!Phase::Commit.can_transition_to(Phase::Propose, false, true, false));
        assert!(!Phase::Commit.can_transition_to(Phase::Propose, false, false, true));
        assert!(Phase::Commit.can_transition_to(Phase::Complete, false, true, false));
        assert!(Phase::Commit.can_transition_to(Phase::Complete, false, false, true));
    }

    #[test]
    fn any_non_terminal_can_fail() {
        for phase in [
            Phase::Idle,
            Phase::Decompose,
            Phase::Propose,
            Phase::Challenge,
            Phase::Revise,
            Phase::Commit,
        ] {
            assert!(phase.can_transition_to(Phase::Failed, false, false, false));
        }
        assert!(!Phase::Complete.can_transition_to(Phase::Failed, false, false, false));
        assert!(!Phase::Failed.can_transition_to(Phase::Failed, false, false, false));
    }

    #[test]
    fn commit_to_propose_archives_round_and_resets_working_fields() {
        let mut ctx = RunContext::new("thread-1", 3);
        ctx.transition(Phase::Propose, false, false, false, "start").unwrap();
        ctx.working_proposal = Some(contribution(ContributionRole::Proposer));
        ctx.transition(Phase::Challenge, false, false, false, "proposed").unwrap();
        ctx.working_challenges.push(contribution(ContributionRole::Challenger));
        ctx.transition(Phase::Revise, false, false, false, "challenged").unwrap();
        ctx.working_revision = Some(contribution(ContributionRole::Reviser));
        ctx.transition(Phase::Commit, false, false, false, "revised").unwrap();
        ctx.pending_decision = Some(decision());

        ctx.transition(Phase::Propose, false, false, false, "not converged")
            .unwrap();

        assert_eq!(ctx.current_round, 1);
        assert_eq!(ctx.history.len(), 1);
        assert!(ctx.working_proposal.is_none());
        assert!(ctx.working_challenges.is_empty());
        assert!(ctx.working_revision.is_none());
        assert!(ctx.pending_decision.is_none());
    }

    #[test]
    fn commit_to_complete_on_round_exhaustion_does_not_archive() {
        let mut ctx = RunContext::new("thread-1", 1);
        ctx.transition(Phase::Propose, false, false, false, "start").unwrap();
        ctx.transition(Phase::Challenge, false, false, false, "x").unwrap();
        ctx.transition(Phase::Revise, false, false, false, "x").unwrap();
        ctx.transition(Phase::Commit, false, false, false, "x").unwrap();
        ctx.transition(Phase::Complete, false, false, true, "rounds exhausted")
            .unwrap();
        assert!(ctx.is_terminal());
        assert!(ctx.history.is_empty());
    }

    #[test]
    fn rejects_skipping_a_phase() {
        let mut ctx = RunContext::new("thread-1", 3);
        let err = ctx
            .transition(Phase::Revise, false, false, false, "skip ahead")
            .unwrap_err();
        assert_eq!(err.from, Phase::Idle);
        assert_eq!(err.to, Phase::Revise);
    }
}
