//! DECOMPOSE handler (§4.5, §4.9): a single cheap-model call with
//! structured output produces the subtask list, which is then validated.

use serde::Deserialize;

use crate::decomposition::{plan_decomposition, SubtaskSpec};
use crate::error::{ConsensusError, ConsensusResult};
use crate::provider::{Message, ProviderRegistry, SelectionRole, SendOptions};

const SYSTEM_PROMPT: &str = "Decompose the question into an ordered list of independent \
subtasks. Each subtask has a short unique label (e.g. \"A\", \"B\"), a one-sentence description, \
and zero or more dependency labels referencing other subtasks in this same list. Respond with \
strict JSON: an array of objects with keys \"label\", \"description\", \"depends_on\" (array of \
strings). Use as few subtasks as the question genuinely requires; a question with no natural \
decomposition should yield exactly one subtask.";

#[derive(Debug, Deserialize)]
struct RawSubtask {
    label: String,
    description: String,
    #[serde(default)]
    depends_on: Vec<String>,
}

/// Calls the cheapest-by-input-cost model with structured output, parses
/// and validates the subtask list. Returns `None` for the single-subtask
/// optimization (§4.9).
pub async fn run_decompose(
    registry: &ProviderRegistry,
    question: &str,
) -> ConsensusResult<Option<Vec<SubtaskSpec>>> {
    let model = registry.select(SelectionRole::Cheapest, &[])?;
    let messages = vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(format!("Question: {question}")),
    ];
    let response = registry.send(&model, &messages, &SendOptions::default()).await?;

    let raw: Vec<RawSubtask> = serde_json::from_str(response.content.trim()).map_err(|e| {
        ConsensusError::DecomposeInvalid(format!("decompose call returned invalid JSON: {e}"))
    })?;

    if raw.is_empty() {
        return Err(ConsensusError::DecomposeInvalid(
            "decompose call returned zero subtasks".to_string(),
        ));
    }

    let subtasks: Vec<SubtaskSpec> = raw
        .into_iter()
        .map(|r| SubtaskSpec {
            label: r.label,
            description: r.description,
            depends_on: r.depends_on,
        })
        .collect();

    plan_decomposition(subtasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_subtask_json() {
        let json = r#"[{"label":"A","description":"choose CI","depends_on":[]},
                        {"label":"B","description":"define stages","depends_on":["A"]}]"#;
        let raw: Vec<RawSubtask> = serde_json::from_str(json).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1].depends_on, vec!["A".to_string()]);
    }

    #[test]
    fn depends_on_defaults_to_empty() {
        let json = r#"[{"label":"A","description":"only task"}]"#;
        let raw: Vec<RawSubtask> = serde_json::from_str(json).unwrap();
        assert!(raw[0].depends_on.is_empty());
    }
}
