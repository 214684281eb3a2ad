//! Storage error taxonomy, converting into `research_core::Error`.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project not found: {0}")]
    NotFound(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("store misconfigured: {0}")]
    Configuration(String),
}

impl StoreError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Postgres(_))
    }
}

impl research_core::error::Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }
}

impl From<StoreError> for research_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Configuration(msg) => research_core::Error::Validation(msg),
            StoreError::InvalidIdentifier(msg) => research_core::Error::Validation(msg),
            StoreError::NotFound(id) => {
                research_core::Error::Storage(anyhow::anyhow!("project not found: {id}"))
            }
            other => research_core::Error::Storage(anyhow::anyhow!(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_converts_to_storage_error() {
        let core: research_core::Error = StoreError::NotFound("abc".into()).into();
        assert!(matches!(core, research_core::Error::Storage(_)));
    }

    #[test]
    fn invalid_identifier_converts_to_validation() {
        let core: research_core::Error =
            StoreError::InvalidIdentifier("bad; drop table".into()).into();
        assert!(matches!(core, research_core::Error::Validation(_)));
    }

    #[test]
    fn configuration_is_not_retryable() {
        assert!(!StoreError::Configuration("missing dsn".into()).is_retryable());
    }
}
