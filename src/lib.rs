//! promptcast library
//!
//! Exposes the browser bridge, configuration and CLI for integration testing.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod history;
pub mod metrics;
pub mod scripts;

pub use bridge::{CdpPage, CdpTabManager};
pub use config::Config;
pub use history::{HistoryEntry, InputHistory};
