//! Unified error taxonomy (§7).
//!
//! Every crate in the workspace has its own local error type for the
//! failure modes specific to it, and converts into this one at the point
//! where a stage or worker function needs to hand an error to the queue
//! broker or record `lastError` on a project. Cache-store and dedup
//! failures never reach this type: they are absorbed locally and logged.

use thiserror::Error;

/// The error kinds a pipeline stage, scheduler tick, or worker step may
/// surface. See SPEC_FULL.md §7 for the propagation policy per kind.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Rate-limit, timeout, or 5xx from an external dependency, retried
    /// with backoff inside the stage; surfaced once retries are exhausted.
    #[error("transient external error: {0}")]
    Transient(String),

    /// LLM output failed to parse against the expected shape after
    /// exhausting the fresh-prompt retry budget.
    #[error("parse/format error: {0}")]
    ParseFormat(String),

    /// Invalid input caught before any external call was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// The job or project state had drifted (stale `nextRunAt`, already
    /// prepared, already deleted). Callers should skip, not retry.
    #[error("state drift: {0}")]
    StateDrift(String),

    /// Every configured search provider is unhealthy or already attempted.
    #[error("all providers exhausted: {0}")]
    ProviderExhausted(String),

    /// The project or delivery-log store failed durably.
    #[error("persistent storage error: {0}")]
    Storage(#[source] anyhow::Error),

    /// The email vendor rejected or failed to accept a send.
    #[error("email send failure: {0}")]
    EmailSend(String),

    /// Escape hatch for conditions not covered by the named kinds above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias used throughout the workspace's pipeline and worker code.
pub type Result<T> = std::result::Result<T, Error>;

/// Implemented by every crate-local error type so `research_search::retry`'s
/// backoff helper can be shared across search, LLM, and email calls instead
/// of each crate reimplementing the same loop over a different type.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Error {
    /// True for kinds §7 marks as retryable by the broker without operator
    /// intervention (transient, provider-exhausted, storage). Parse/format
    /// is retried *inside* the stage already, not by the broker; validation
    /// and state-drift are never retried.
    #[must_use]
    pub fn is_broker_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transient(_) | Error::ProviderExhausted(_) | Error::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_broker_retryable() {
        assert!(Error::Transient("timeout".into()).is_broker_retryable());
    }

    #[test]
    fn validation_is_not_broker_retryable() {
        assert!(!Error::Validation("bad language code".into()).is_broker_retryable());
    }

    #[test]
    fn state_drift_is_not_broker_retryable() {
        assert!(!Error::StateDrift("stale job".into()).is_broker_retryable());
    }

    #[test]
    fn display_messages_are_informative() {
        let err = Error::ParseFormat("expected array".into());
        assert_eq!(err.to_string(), "parse/format error: expected array");
    }

    #[test]
    fn other_converts_from_anyhow() {
        let err: Error = anyhow::anyhow!("boom").into();
        assert!(matches!(err, Error::Other(_)));
    }
}
