//! Broadcast orchestration: fan one prompt out to many chat tabs.
//!
//! The crate owns tab preparation, per-tab retries and the aggregate verdict. Page work is
//! delegated to [`page_injector::Injector`], tab lifecycle to [`ports::TabManager`].

pub mod aggregate;
pub mod batch;
pub mod broadcaster;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod ports;

#[cfg(test)]
mod testing;

pub use aggregate::{summarize, BatchSummary};
pub use batch::BatchExecutor;
pub use broadcaster::{Broadcaster, Delivery};
pub use errors::{BroadcastError, SiteFailure, TabError};
pub use metrics::register_metrics;
pub use model::{
    BatchInjectionResult, BatchPolicy, BroadcastReport, SiteReadiness, TabJob, UnresolvedSite,
};
pub use ports::TabManager;
