//! Sycophancy detection (§4.6): a pure function over a fixed marker list,
//! scanning only a challenge's leading window.

/// How many leading characters of a challenge are scanned for praise
/// markers.
const SCAN_WINDOW_CHARS: usize = 200;

/// Fixed, lower-cased praise/agreement openers. Source material enumerates
/// roughly 14 phrases; treated here as configurable and meant to be
/// calibrated against a labeled corpus rather than grown ad hoc.
const MARKERS: &[&str] = &[
    "great answer",
    "great proposal",
    "i largely agree",
    "i agree",
    "no significant flaws",
    "this is a good",
    "well done",
    "excellent proposal",
    "excellent answer",
    "this looks good",
    "solid approach",
    "i have no major concerns",
    "overall this is correct",
    "nothing to add",
];

/// True if the leading window of `text` opens with a praise/agreement
/// marker. Case-insensitive; leading whitespace is stripped before scanning.
pub fn is_sycophantic(text: &str) -> bool {
    let trimmed = text.trim_start();
    let window: String = trimmed.chars().take(SCAN_WINDOW_CHARS).collect();
    let lower = window.to_lowercase();
    MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_a_leading_praise_opener() {
        assert!(is_sycophantic("Great answer! I have nothing to add."));
        assert!(is_sycophantic("  i largely agree with this proposal."));
    }

    #[test]
    fn is_case_insensitive() {
        assert!(is_sycophantic("EXCELLENT PROPOSAL, no concerns here."));
    }

    #[test]
    fn does_not_flag_genuine_disagreement() {
        assert!(!is_sycophantic(
            "This proposal misses cache eviction entirely and ignores read-heavy workloads."
        ));
    }

    #[test]
    fn marker_outside_scan_window_is_not_flagged() {
        let padding = "x".repeat(SCAN_WINDOW_CHARS + 20);
        let text = format!("{padding} great answer");
        assert!(!is_sycophantic(&text));
    }
}
