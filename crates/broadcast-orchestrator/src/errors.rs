use promptcast_core_types::{CastError, SiteId, TabId};
use promptcast_sites::SiteError;
use serde::Serialize;
use thiserror::Error;

/// Failure to obtain or prepare a browser tab.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TabError {
    #[error("could not open a tab for {site}: {reason}")]
    OpenFailed { site: SiteId, reason: String },
    #[error("{0} is no longer open")]
    Closed(TabId),
    #[error("{tab} did not finish loading within {timeout_ms}ms")]
    NotReady { tab: TabId, timeout_ms: u64 },
    #[error("browser unavailable: {0}")]
    Browser(String),
}

/// A site whose batch entry failed, with the error that ended it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteFailure {
    pub site: SiteId,
    pub tab: Option<TabId>,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("every site failed ({} of {total})", failures.len())]
    TotalBatchFailure {
        total: usize,
        failures: Vec<SiteFailure>,
    },
    #[error("no enabled sites to send to")]
    NoSites,
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error(transparent)]
    Site(#[from] SiteError),
}

impl From<BroadcastError> for CastError {
    fn from(err: BroadcastError) -> Self {
        CastError::new(err.to_string())
    }
}
