//! COMMIT handler (§4.5): pure extraction and scoring, no model call.

use crate::model::{domain_cap, Intent};
use crate::persistence::types::{Contribution, Decision, Taxonomy, TurnId};

/// `max(0.5, 0.5 + 0.5 * genuine / total)`; 0.5 when there are no
/// challenges at all.
pub fn compute_rigor(challenges: &[Contribution]) -> f64 {
    if challenges.is_empty() {
        return 0.5;
    }
    let total = challenges.len() as f64;
    let genuine = challenges
        .iter()
        .filter(|c| !c.sycophantic.unwrap_or(false))
        .count() as f64;
    (0.5 + 0.5 * (genuine / total)).max(0.5)
}

pub fn compute_confidence(rigor: f64, intent: Intent) -> f64 {
    domain_cap(intent).min(rigor)
}

/// Concatenation, separated by blank lines, of `"[model_ref]: content"` for
/// every non-sycophantic challenge; `None` when empty.
pub fn compute_dissent(challenges: &[Contribution]) -> Option<String> {
    let parts: Vec<String> = challenges
        .iter()
        .filter(|c| !c.sycophantic.unwrap_or(false))
        .map(|c| format!("[{}]: {}", c.model_ref, c.content))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Extracts and scores the Decision for a turn from its revision and
/// challenge set. `taxonomy` is supplied by an optional upstream classifier
/// call; absent, it defaults to empty tags.
pub fn run_commit(
    turn_id: &TurnId,
    revision: &Contribution,
    challenges: &[Contribution],
    intent: Intent,
    taxonomy: Taxonomy,
) -> Decision {
    let rigor = compute_rigor(challenges);
    let confidence = compute_confidence(rigor, intent);
    let dissent = compute_dissent(challenges);

    Decision {
        turn_id: turn_id.clone(),
        content: revision.content.clone(),
        rigor,
        confidence,
        dissent,
        taxonomy,
        created_at: chrono::Utc::now(),
    }
}
