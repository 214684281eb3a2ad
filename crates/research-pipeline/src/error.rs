//! Pipeline-level error, converting into `research_core::Error` at the
//! point the research worker needs to record `lastError` on a project.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("project not found")]
    ProjectNotFound,

    #[error(transparent)]
    Search(#[from] research_search::SearchError),

    #[error(transparent)]
    Llm(#[from] research_llm::LlmError),

    #[error(transparent)]
    Store(#[from] research_store::StoreError),

    #[error("report failed its markdown contract: {0}")]
    ReportContractViolation(String),

    #[error(transparent)]
    Cancelled(#[from] research_core::cancel::Cancelled),
}

impl From<PipelineError> for research_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ProjectNotFound => {
                research_core::Error::StateDrift("project not found".into())
            }
            PipelineError::Search(e) => e.into(),
            PipelineError::Llm(e) => research_core::Error::ParseFormat(e.to_string()),
            PipelineError::Store(e) => e.into(),
            PipelineError::ReportContractViolation(msg) => research_core::Error::ParseFormat(msg),
            PipelineError::Cancelled(_) => {
                research_core::Error::Transient("pipeline cancelled".into())
            }
        }
    }
}

/// §7's whole-body retry (§4.F step 9: "retried up to 3 times ... on any
/// failure in 2-9") treats every failure that can occur inside that span as
/// worth another attempt; a cancelled run is the one exception, since
/// retrying after shutdown was requested would fight the signal that
/// caused it.
impl research_core::error::Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        !matches!(self, PipelineError::Cancelled(_) | PipelineError::ProjectNotFound)
    }
}
