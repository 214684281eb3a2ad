//! LLM error taxonomy, converting into `research_core::Error` at the
//! pipeline boundary the same way `research_search::SearchError` does.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] async_openai::error::OpenAIError),

    /// A response that didn't parse into the expected structured shape —
    /// distinct from a transport failure so the pipeline's
    /// retry-with-fresh-prompt policy (§7) can target it specifically.
    #[error("llm response did not match expected format: {0}")]
    ParseFailure(String),

    #[error("unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("llm capability not supported by this provider: {0}")]
    Unsupported(String),
}

impl LlmError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Request(_) | LlmError::ParseFailure(_))
    }
}

impl research_core::error::Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        LlmError::is_retryable(self)
    }
}

impl From<LlmError> for research_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ParseFailure(msg) => research_core::Error::ParseFormat(msg),
            LlmError::UnsupportedLanguage(msg) => research_core::Error::Validation(msg),
            LlmError::Unsupported(msg) => research_core::Error::Validation(msg),
            other @ LlmError::Request(_) => research_core::Error::Transient(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failure_converts_to_parse_format() {
        let core: research_core::Error = LlmError::ParseFailure("bad json".into()).into();
        assert!(matches!(core, research_core::Error::ParseFormat(_)));
    }

    #[test]
    fn unsupported_language_converts_to_validation() {
        let core: research_core::Error = LlmError::UnsupportedLanguage("xx".into()).into();
        assert!(matches!(core, research_core::Error::Validation(_)));
    }

    #[test]
    fn parse_failure_is_retryable() {
        assert!(LlmError::ParseFailure("x".into()).is_retryable());
    }

    #[test]
    fn unsupported_language_is_not_retryable() {
        assert!(!LlmError::UnsupportedLanguage("xx".into()).is_retryable());
    }
}
