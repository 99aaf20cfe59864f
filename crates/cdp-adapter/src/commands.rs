//! Parameter and result types exposed by the CDP adapter interface.

use serde::{Deserialize, Serialize};

use crate::ids::PageId;

/// Readiness gate for [`crate::Cdp::wait_basic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitGate {
    /// `document.readyState` is `interactive` or `complete`.
    DomReady,
    /// `document.readyState` is `complete`.
    Load,
}

impl WaitGate {
    pub fn accepts(&self, ready_state: &str) -> bool {
        match self {
            WaitGate::DomReady => matches!(ready_state, "interactive" | "complete"),
            WaitGate::Load => ready_state == "complete",
        }
    }
}

/// A page target as last reported by the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: PageId,
    pub target_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    /// A protocol session is attached and page commands can be sent.
    pub attached: bool,
}
