use std::path::PathBuf;

use promptcast_core_types::{CastError, SiteId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("unknown site '{0}'")]
    UnknownSite(SiteId),
    #[error("duplicate site id '{0}' in catalog")]
    DuplicateSite(SiteId),
    #[error("site '{0}' has no input selectors")]
    NoInputSelectors(SiteId),
    #[error("invalid site url for '{id}': {url}")]
    InvalidUrl { id: SiteId, url: String },
    #[error("preferences io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("preferences decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<SiteError> for CastError {
    fn from(err: SiteError) -> Self {
        CastError::new(err.to_string())
    }
}
