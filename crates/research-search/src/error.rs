//! Search-provider error taxonomy, converting into `research_core::Error`
//! at the pipeline boundary.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search response too large or malformed: {0}")]
    Response(String),

    /// 4xx other than 429 — §4.B says these abort immediately, no retry.
    #[error("search client error ({status}): {body}")]
    Client { status: u16, body: String },

    #[error("all search providers exhausted: {0}")]
    AllProvidersExhausted(String),

    #[error("search provider misconfigured: {0}")]
    Configuration(String),
}

impl SearchError {
    /// §4.B: "abort on client errors (4xx except 429)".
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Client { status, .. } => *status == 429,
            SearchError::Request(_) | SearchError::Response(_) => true,
            SearchError::AllProvidersExhausted(_) | SearchError::Configuration(_) => false,
        }
    }
}

impl research_core::error::Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        SearchError::is_retryable(self)
    }
}

impl From<SearchError> for research_core::Error {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::AllProvidersExhausted(msg) => research_core::Error::ProviderExhausted(msg),
            SearchError::Configuration(msg) => research_core::Error::Validation(msg),
            other => research_core::Error::Transient(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_client_error_is_retryable() {
        let err = SearchError::Client {
            status: 429,
            body: "slow down".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_client_error_is_not_retryable() {
        let err = SearchError::Client {
            status: 404,
            body: "not found".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn exhausted_converts_to_provider_exhausted() {
        let core: research_core::Error =
            SearchError::AllProvidersExhausted("no healthy provider".into()).into();
        assert!(matches!(core, research_core::Error::ProviderExhausted(_)));
    }
}
