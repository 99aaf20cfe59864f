use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Tunable delays and limits for one injection run. Every field has a serde default so partial
/// config sections deserialize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionPolicy {
    pub max_message_len: usize,
    pub focus_settle_ms: u64,
    pub post_inject_settle_ms: u64,
    pub locate_attempts: u32,
    pub locate_delay_ms: u64,
    pub observer_timeout_ms: u64,
    pub submit_attempts: u32,
    pub submit_interval_ms: u64,
    pub stop_poll_interval_ms: u64,
    pub stop_timeout_ms: u64,
}

impl Default for InjectionPolicy {
    fn default() -> Self {
        Self {
            max_message_len: 100_000,
            focus_settle_ms: 100,
            post_inject_settle_ms: 300,
            locate_attempts: 10,
            locate_delay_ms: 500,
            observer_timeout_ms: 10_000,
            submit_attempts: 3,
            submit_interval_ms: 200,
            stop_poll_interval_ms: 200,
            stop_timeout_ms: 3_000,
        }
    }
}

impl InjectionPolicy {
    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn post_inject_settle(&self) -> Duration {
        Duration::from_millis(self.post_inject_settle_ms)
    }

    pub fn locate_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.locate_attempts, Duration::from_millis(self.locate_delay_ms))
    }

    pub fn observer_timeout(&self) -> Duration {
        Duration::from_millis(self.observer_timeout_ms)
    }

    pub fn submit_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.submit_attempts, Duration::from_millis(self.submit_interval_ms))
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
