//! Queue broker error taxonomy, converting into `research_core::Error`.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    NotFound(String),
}

impl QueueError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Redis(_))
    }
}

impl research_core::error::Retryable for QueueError {
    fn is_retryable(&self) -> bool {
        QueueError::is_retryable(self)
    }
}

impl From<QueueError> for research_core::Error {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(id) => {
                research_core::Error::StateDrift(format!("job not found: {id}"))
            }
            other => research_core::Error::Storage(anyhow::anyhow!(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_converts_to_state_drift() {
        let core: research_core::Error = QueueError::NotFound("abc".into()).into();
        assert!(matches!(core, research_core::Error::StateDrift(_)));
    }
}
