//! Error type for tracing/metrics initialization.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to initialize tracing subscriber: {0}")]
    Initialization(String),

    #[error("failed to connect OTLP exporter: {0}")]
    ExporterConnection(String),

    #[error("metrics operation failed: {0}")]
    Metrics(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_error_display() {
        let err = Error::Initialization("subscriber already set".to_string());
        assert_eq!(err.to_string(), "failed to initialize tracing subscriber: subscriber already set");
    }

    #[test]
    fn other_error_from_anyhow() {
        let err = Error::from(anyhow::anyhow!("boom"));
        assert!(matches!(err, Error::Other(_)));
    }
}
