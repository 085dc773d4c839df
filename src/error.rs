//! Crate-wide error kinds.
//!
//! Mirrors the propagation policy in the design doc: `Timeout`,
//! `ProviderUnavailable`, `ModelLoadFailed`, and `ResourceExhausted` are
//! caught inside the router/failover manager and drive fallback; only
//! `AllProvidersFailed` and `InvalidInput` are meant to reach an external
//! caller uncaught.

use thiserror::Error;

/// Top-level error type surfaced by the router, failover manager, and
/// context store.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Empty or oversized caller input. Not retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Per-call deadline breached.
    #[error("operation timed out after {elapsed_secs:.2}s (deadline {deadline_secs:.2}s)")]
    Timeout {
        elapsed_secs: f64,
        deadline_secs: f64,
    },

    /// Adapter transport error, 5xx, or failed health check.
    #[error("provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Lifecycle transition to ERROR while loading/unloading a model.
    #[error("failed to load model {model}: {message}")]
    ModelLoadFailed { model: String, message: String },

    /// Admission refused by concurrency or memory thresholds.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Durable context backend failure. Handled internally by fallback to
    /// the in-process store; only constructed for diagnostics/logging, not
    /// normally propagated to callers.
    #[error("context backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Every provider in the failover chain failed.
    #[error("All LLM providers failed")]
    AllProvidersFailed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = RouterError::ResourceExhausted("gpu memory above threshold".into());
        assert_eq!(
            err.to_string(),
            "resource exhausted: gpu memory above threshold"
        );
    }

    #[test]
    fn all_providers_failed_has_fixed_message() {
        assert_eq!(
            RouterError::AllProvidersFailed.to_string(),
            "All LLM providers failed"
        );
    }
}
