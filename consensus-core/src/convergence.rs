//! Convergence detector (§4.7): average, over the current round's
//! challenges, of each challenge's maximum Jaccard word-overlap against any
//! challenge in the previous round.

use std::collections::HashSet;

pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 0.7;

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Invoked after COMMIT. `previous_round` and `current_round` are challenge
/// texts. Round 1 has no previous round and never converges.
pub fn has_converged(
    previous_round: Option<&[String]>,
    current_round: &[String],
    threshold: f64,
) -> bool {
    let Some(previous) = previous_round else {
        return false;
    };
    if previous.is_empty() || current_round.is_empty() {
        return false;
    }

    let previous_sets: Vec<HashSet<String>> = previous.iter().map(|t| word_set(t)).collect();
    let maxima: Vec<f64> = current_round
        .iter()
        .map(|challenge| {
            let current_set = word_set(challenge);
            previous_sets
                .iter()
                .map(|prev_set| jaccard(&current_set, prev_set))
                .fold(0.0_f64, f64::max)
        })
        .collect();

    let avg = maxima.iter().sum::<f64>() / maxima.len() as f64;
    avg >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_one_never_converges() {
        let current = vec!["misses cache eviction".to_string()];
        assert!(!has_converged(None, &current, DEFAULT_CONVERGENCE_THRESHOLD));
    }

    #[test]
    fn repeated_challenges_converge() {
        let previous = vec![
            "X misses cache eviction".to_string(),
            "X ignores read heavy workloads".to_string(),
        ];
        let current = vec![
            "misses cache eviction discussion".to_string(),
            "ignores read heavy workloads".to_string(),
        ];
        assert!(has_converged(
            Some(&previous),
            &current,
            DEFAULT_CONVERGENCE_THRESHOLD
        ));
    }

    #[test]
    fn distinct_challenges_do_not_converge() {
        let previous = vec!["completely unrelated topic one".to_string()];
        let current = vec!["an entirely different concern here".to_string()];
        assert!(!has_converged(
            Some(&previous),
            &current,
            DEFAULT_CONVERGENCE_THRESHOLD
        ));
    }

    #[test]
    fn empty_current_round_does_not_converge() {
        let previous = vec!["x".to_string()];
        assert!(!has_converged(Some(&previous), &[], DEFAULT_CONVERGENCE_THRESHOLD));
    }
}
