//! Crate-wide error taxonomy.
//!
//! Every fallible operation in this crate surfaces one of these kinds rather
//! than a provider-native or storage-native error type. Adapters and stores
//! map their internal failures into this taxonomy at the boundary.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// The full error taxonomy for the consensus engine.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Credentials missing or rejected by the provider. Fatal.
    #[error("provider auth failed for {provider}: {message}")]
    ProviderAuth { provider: String, message: String },

    /// Provider signaled a rate limit, optionally with a retry-after hint.
    #[error("provider {provider} rate limited{}", retry_after_fmt(*retry_after_secs))]
    ProviderRateLimited {
        provider: String,
        retry_after_secs: Option<f64>,
    },

    /// A provider call exceeded its deadline.
    #[error("provider {provider} timed out after {elapsed_secs:.1}s")]
    ProviderTimeout { provider: String, elapsed_secs: f64 },

    /// Server-side 5xx-class failure.
    #[error("provider {provider} overloaded: {message}")]
    ProviderOverloaded { provider: String, message: String },

    /// The referenced model is not registered.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Cumulative cost would breach the configured hard limit.
    #[error("cost limit exceeded: cumulative {cumulative:.4} + projected {projected:.4} > limit {limit:.4}")]
    CostLimitExceeded {
        cumulative: f64,
        projected: f64,
        limit: f64,
    },

    /// No eligible proposer or zero challengers are registered.
    #[error("insufficient models registered for consensus: {0}")]
    InsufficientModels(String),

    /// A handler ran in the wrong state or with missing run-context fields.
    #[error("invalid orchestrator state: {0}")]
    InvalidState(String),

    /// Decomposition produced a subtask list that fails validation.
    #[error("invalid decomposition: {0}")]
    DecomposeInvalid(String),

    /// A persistence operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Catch-all for a non-provider failure reaching an adapter boundary
    /// (e.g. malformed JSON, network failure after retries exhausted).
    #[error("{0}")]
    Other(String),
}

impl ConsensusError {
    /// Whether the retry policy should consider this error retryable.
    ///
    /// Retryable: rate-limit, timeout, overloaded. Fatal: everything else.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConsensusError::ProviderRateLimited { .. }
                | ConsensusError::ProviderTimeout { .. }
                | ConsensusError::ProviderOverloaded { .. }
        )
    }

    /// The retry-after hint carried by a rate-limit error, if any.
    pub fn retry_hint_secs(&self) -> Option<f64> {
        match self {
            ConsensusError::ProviderRateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

fn retry_after_fmt(secs: Option<f64>) -> String {
    match secs {
        Some(s) => format!(" (retry after {s:.1}s)"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_timeout_are_retryable() {
        let e = ConsensusError::ProviderRateLimited {
            provider: "acme".into(),
            retry_after_secs: Some(2.0),
        };
        assert!(e.is_retryable());
        assert_eq!(e.retry_hint_secs(), Some(2.0));

        let e = ConsensusError::ProviderTimeout {
            provider: "acme".into(),
            elapsed_secs: 120.0,
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn auth_and_model_not_found_are_fatal() {
        let e = ConsensusError::ProviderAuth {
            provider: "acme".into(),
            message: "bad key".into(),
        };
        assert!(!e.is_retryable());

        let e = ConsensusError::ModelNotFound("acme:foo".into());
        assert!(!e.is_retryable());
    }
}
