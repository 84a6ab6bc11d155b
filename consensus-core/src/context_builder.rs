//! Context builder (§4.12): assembles prior summary, recent decisions, and
//! recorded outcomes into a text block bounded by a token budget.

use crate::persistence::types::{Decision, Outcome, Summary};

/// Characters per token, matching the crate-wide char-count estimation
/// convention (§4.12, "4-chars-per-token estimation").
const CHARS_PER_TOKEN: f64 = 4.0;

pub const DEFAULT_TOKEN_BUDGET: u32 = 2000;

fn estimate_tokens(text: &str) -> u32 {
    (text.len() as f64 / CHARS_PER_TOKEN).ceil() as u32
}

/// One candidate block, in descending priority order, before truncation.
struct Item {
    text: String,
}

fn format_decision(decision: &Decision) -> String {
    let confidence_pct = (decision.confidence * 100.0).round() as i64;
    let mut block = format!("{} [confidence: {}%]", decision.content, confidence_pct);
    if let Some(dissent) = &decision.dissent {
        block.push('\n');
        block.push_str(dissent);
    }
    block
}

fn format_outcome(outcome: &Outcome) -> String {
    match &outcome.notes {
        Some(notes) => format!("[OUTCOME: {:?}] {}", outcome.result, notes),
        None => format!("[OUTCOME: {:?}]", outcome.result),
    }
}

/// Builds a context block from the thread summary (if any), most recent
/// decisions (newest first), and outcomes, dropping whole lowest-priority
/// items until the result fits `budget_tokens`.
pub fn build_context(
    thread_summary: Option<&Summary>,
    decisions_newest_first: &[Decision],
    outcomes: &[Outcome],
    budget_tokens: u32,
) -> String {
    let mut items = Vec::new();

    if let Some(summary) = thread_summary {
        items.push(Item {
            text: summary.content.clone(),
        });
    }
    for decision in decisions_newest_first {
        items.push(Item {
            text: format_decision(decision),
        });
    }
    for outcome in outcomes {
        items.push(Item {
            text: format_outcome(outcome),
        });
    }

    let mut kept = Vec::new();
    let mut used_tokens = 0u32;
    for item in items {
        let item_tokens = estimate_tokens(&item.text);
        if used_tokens + item_tokens > budget_tokens {
            continue;
        }
        used_tokens += item_tokens;
        kept.push(item.text);
    }

    kept.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::types::{OutcomeResult, Taxonomy};
    use chrono::Utc;

    fn decision(content: &str, confidence: f64) -> Decision {
        Decision {
            turn_id: "turn-1".to_string(),
            content: content.to_string(),
            rigor: 1.0,
            confidence,
            dissent: None,
            taxonomy: Taxonomy::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn formats_decision_with_confidence_and_dissent() {
        let mut d = decision("use a monolith", 0.70);
        d.dissent = Some("[acme:big]: but consider microservices".to_string());
        let text = format_decision(&d);
        assert!(text.contains("use a monolith [confidence: 70%]"));
        assert!(text.contains("but consider microservices"));
    }

    #[test]
    fn priority_order_is_summary_then_decisions_then_outcomes() {
        let summary = Summary::new("thread-1".to_string(), "prior summary text");
        let decisions = vec![decision("latest decision", 0.8)];
        let outcome = Outcome::new(
            "thread-1".to_string(),
            OutcomeResult::Success,
            Some("worked well".to_string()),
        );
        let outcomes = vec![outcome];

        let context = build_context(Some(&summary), &decisions, &outcomes, DEFAULT_TOKEN_BUDGET);
        let summary_pos = context.find("prior summary text").unwrap();
        let decision_pos = context.find("latest decision").unwrap();
        let outcome_pos = context.find("[OUTCOME:").unwrap();
        assert!(summary_pos < decision_pos);
        assert!(decision_pos < outcome_pos);
    }

    #[test]
    fn drops_whole_lowest_priority_items_to_fit_budget() {
        let decisions: Vec<Decision> = (0..50)
            .map(|i| decision(&format!("decision number {i} with enough text to cost tokens"), 0.8))
            .collect();
        let context = build_context(None, &decisions, &[], 100);
        assert!(estimate_tokens(&context) <= 100);
        assert!(context.contains("decision number 0"));
    }

    #[test]
    fn never_truncates_mid_item() {
        let decisions = vec![decision("short one", 0.8)];
        let context = build_context(None, &decisions, &[], 3);
        assert!(context.is_empty() || context.contains("short one"));
    }
}
