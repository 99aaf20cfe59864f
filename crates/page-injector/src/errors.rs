use promptcast_core_types::CastError;
use thiserror::Error;

/// Failure of a single page-context call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("page unreachable: {0}")]
    Unreachable(String),
    #[error("element is detached or stale")]
    StaleElement,
    #[error("page script failed: {0}")]
    Script(String),
    #[error("page rejected the operation: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InjectError {
    #[error("no visible {0} element matched any selector")]
    NotFound(String),
    #[error("injection failed: {0}")]
    InjectionFailed(String),
    #[error("no injection strategy applies to <{0}>")]
    UnsupportedElement(String),
    #[error("submission uncertain: {0}")]
    SubmissionUncertain(String),
    #[error("tab unavailable: {0}")]
    TabUnavailable(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl From<PageError> for InjectError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Unreachable(reason) => InjectError::TabUnavailable(reason),
            other => InjectError::InjectionFailed(other.to_string()),
        }
    }
}

impl From<InjectError> for CastError {
    fn from(err: InjectError) -> Self {
        CastError::new(err.to_string())
    }
}
