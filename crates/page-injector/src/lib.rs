//! Page-level injection engine.
//!
//! Everything in this crate talks to a page through [`ports::PagePort`]; the crate never knows
//! whether that page lives behind CDP or in memory.

pub mod api;
pub mod errors;
pub mod locator;
pub mod model;
pub mod policy;
pub mod ports;
pub mod readiness;
pub mod retry;
pub mod stop;
pub mod strategies;
pub mod submit;
pub mod visibility;

mod runner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{Injector, PageInjector};
pub use errors::{InjectError, PageError};
pub use model::{
    DomEvent, ElementDescriptor, ElementGeometry, ElementInfo, ElementKind, ElementRef,
    InjectionDetails, InjectionResult, PageDescriptor, ReadinessDetails, ReadinessResult,
    StrategyKind, SubmissionMethod, TimingInfo,
};
pub use policy::InjectionPolicy;
pub use ports::{PagePort, WatchId};
pub use retry::{poll_until, retry, Backoff, PollOutcome, Retried, RetryPolicy};
