//! Decomposition scheduler (§4.9): validates a subtask DAG with a
//! Kahn's-algorithm topological check, then runs subtasks in dependency
//! waves, synthesizing their outputs into one final answer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;

use futures::future::join_all;

use crate::error::{ConsensusError, ConsensusResult};
use crate::model::ModelRef;
use crate::provider::{Message, ProviderRegistry, SelectionRole, SendOptions};

/// One subtask as produced by the decompose call, before it is persisted.
#[derive(Debug, Clone)]
pub struct SubtaskSpec {
    pub label: String,
    pub description: String,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisStrategy {
    Merge,
    Prioritize,
}

/// The outcome of running one subtask's full consensus cycle.
#[derive(Debug, Clone)]
pub struct SubtaskResult {
    pub label: String,
    pub content: String,
    pub rigor: f64,
    pub confidence: f64,
    pub cost: f64,
}

/// `None` if exactly one subtask was produced: the caller should skip
/// decomposition and run plain consensus on the original question instead
/// (§4.9 "single-subtask optimization").
pub fn plan_decomposition(subtasks: Vec<SubtaskSpec>) -> ConsensusResult<Option<Vec<SubtaskSpec>>> {
    if subtasks.len() == 1 {
        return Ok(None);
    }
    validate_dag(&subtasks)?;
    Ok(Some(subtasks))
}

/// Labels unique, dependencies resolvable, graph acyclic — verified by
/// confirming Kahn's algorithm can produce a topological order covering
/// every node.
fn validate_dag(subtasks: &[SubtaskSpec]) -> ConsensusResult<Vec<String>> {
    let labels: HashSet<&str> = subtasks.iter().map(|s| s.label.as_str()).collect();
    if labels.len() != subtasks.len() {
        return Err(ConsensusError::DecomposeInvalid(
            "duplicate subtask labels".to_string(),
        ));
    }

    let mut in_degree: HashMap<&str, usize> = subtasks.iter().map(|s| (s.label.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for subtask in subtasks {
        for dep in &subtask.depends_on {
            if !labels.contains(dep.as_str()) {
                return Err(ConsensusError::DecomposeInvalid(format!(
                    "unresolved dependency label: {dep}"
                )));
            }
            *in_degree.get_mut(subtask.label.as_str()).unwrap() += 1;
            dependents.entry(dep.as_str()).or_default().push(subtask.label.as_str());
        }
    }

    let mut ready: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(l, _)| *l)
        .collect();
    let mut order = Vec::new();

    while let Some(label) = ready.pop_front() {
        order.push(label.to_string());
        if let Some(deps) = dependents.get(label) {
            for &dependent in deps {
                let degree = in_degree.get_mut(dependent).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if order.len() != subtasks.len() {
        return Err(ConsensusError::DecomposeInvalid(
            "dependency graph contains a cycle".to_string(),
        ));
    }

    Ok(order)
}

/// Runs `subtasks` in Kahn's-algorithm dependency waves: all subtasks whose
/// dependencies have completed run simultaneously. `run_subtask` receives
/// the subtask and the already-completed results of its dependencies.
pub async fn run_scheduler<F, Fut>(
    subtasks: &[SubtaskSpec],
    run_subtask: F,
) -> ConsensusResult<Vec<SubtaskResult>>
where
    F: Fn(SubtaskSpec, Vec<SubtaskResult>) -> Fut,
    Fut: Future<Output = ConsensusResult<SubtaskResult>>,
{
    validate_dag(subtasks)?;

    let by_label: HashMap<String, SubtaskSpec> =
        subtasks.iter().map(|s| (s.label.clone(), s.clone())).collect();

    let mut in_degree: HashMap<String, usize> = HashMap::new();
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for s in subtasks {
        in_degree.insert(s.label.clone(), s.depends_on.len());
        for dep in &s.depends_on {
            dependents.entry(dep.clone()).or_default().push(s.label.clone());
        }
    }

    let mut completed: HashMap<String, SubtaskResult> = HashMap::new();
    let mut ready: Vec<String> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(l, _)| l.clone())
        .collect();

    while !ready.is_empty() {
        let wave = std::mem::take(&mut ready);
        let futures = wave.iter().map(|label| {
            let spec = by_label.get(label).unwrap().clone();
            let dep_results: Vec<SubtaskResult> = spec
                .depends_on
                .iter()
                .filter_map(|d| completed.get(d).cloned())
                .collect();
            run_subtask(spec, dep_results)
        });

        let results = join_all(futures).await;
        for result in results {
            let result = result?;
            if let Some(deps) = dependents.get(&result.label) {
                for dependent in deps {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(dependent.clone());
                    }
                }
            }
            completed.insert(result.label.clone(), result);
        }
    }

    Ok(subtasks
        .iter()
        .filter_map(|s| completed.get(&s.label).cloned())
        .collect())
}

/// Synthesis call: merges subtask outputs into one answer. Uses the
/// cheapest-by-input-cost model (§4.9).
pub async fn synthesize(
    registry: &ProviderRegistry,
    question: &str,
    results: &[SubtaskResult],
    strategy: SynthesisStrategy,
) -> ConsensusResult<(String, f64)> {
    let model: ModelRef = registry.select(SelectionRole::Cheapest, &[])?;

    let mut prompt = format!(
        "Original question: {question}\n\nThe question was decomposed into subtasks, each \
         answered independently. Combine them into one coherent final answer"
    );
    prompt.push_str(match strategy {
        SynthesisStrategy::Merge => ".\n\n",
        SynthesisStrategy::Prioritize => {
            ", weighting subtasks with higher reported rigor/confidence more heavily.\n\n"
        }
    });
    for result in results {
        prompt.push_str(&format!(
            "--- {} [rigor={:.2} confidence={:.2}] ---\n{}\n\n",
            result.label, result.rigor, result.confidence, result.content
        ));
    }

    let messages = vec![Message::user(prompt)];
    let response = registry.send(&model, &messages, &SendOptions::default()).await?;
    let descriptor = registry.descriptor(&model);
    let cost = descriptor
        .map(|d| d.estimate_cost(response.usage.input_tokens, response.usage.output_tokens))
        .unwrap_or(0.0);
    Ok((response.content, cost))
}
