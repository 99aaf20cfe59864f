//! Glue between the CDP adapter and the broadcaster's ports.

mod page;
mod tabs;

pub use page::CdpPage;
pub use tabs::CdpTabManager;

use cdp_adapter::{AdapterError, AdapterErrorKind};
use page_injector::PageError;

pub(crate) fn page_error(err: AdapterError) -> PageError {
    if err.is_stale_object() {
        return PageError::StaleElement;
    }
    match err.kind {
        AdapterErrorKind::ScriptError => {
            PageError::Script(err.hint.unwrap_or_else(|| err.kind.to_string()))
        }
        AdapterErrorKind::CdpIo | AdapterErrorKind::TargetNotFound | AdapterErrorKind::NavTimeout => {
            PageError::Unreachable(err.to_string())
        }
        AdapterErrorKind::Internal => PageError::Script(err.to_string()),
    }
}
