//! Email-send error taxonomy, converting into `research_core::Error`.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email response too large or malformed: {0}")]
    Response(String),

    /// 4xx other than 429 — aborts immediately, same policy as search (§4.B).
    #[error("email vendor client error ({status}): {body}")]
    Client { status: u16, body: String },

    #[error("email vendor misconfigured: {0}")]
    Configuration(String),

    #[error("email vendor rejected the send: {0}")]
    Rejected(String),
}

impl EmailError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            EmailError::Client { status, .. } => *status == 429,
            EmailError::Request(_) | EmailError::Response(_) => true,
            EmailError::Configuration(_) | EmailError::Rejected(_) => false,
        }
    }
}

impl research_core::error::Retryable for EmailError {
    fn is_retryable(&self) -> bool {
        EmailError::is_retryable(self)
    }
}

impl From<EmailError> for research_core::Error {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::Configuration(msg) => research_core::Error::Validation(msg),
            other => research_core::Error::EmailSend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_client_error_is_retryable() {
        let err = EmailError::Client {
            status: 429,
            body: "slow down".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn rejected_send_is_not_retryable() {
        assert!(!EmailError::Rejected("invalid recipient".into()).is_retryable());
    }

    #[test]
    fn configuration_converts_to_validation() {
        let core: research_core::Error = EmailError::Configuration("missing key".into()).into();
        assert!(matches!(core, research_core::Error::Validation(_)));
    }

    #[test]
    fn rejected_converts_to_email_send() {
        let core: research_core::Error = EmailError::Rejected("bounced".into()).into();
        assert!(matches!(core, research_core::Error::EmailSend(_)));
    }
}
