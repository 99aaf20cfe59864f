use std::time::Duration;

use page_injector::{InjectionResult, ReadinessResult, RetryPolicy};
use promptcast_core_types::{SiteId, TabId};
use promptcast_sites::SiteConfig;
use serde::{Deserialize, Serialize};

/// One unit of batch work: a resolved tab and the site it shows.
#[derive(Clone, Debug)]
pub struct TabJob {
    pub tab_id: TabId,
    pub site: SiteConfig,
}

impl TabJob {
    pub fn new(tab_id: TabId, site: SiteConfig) -> Self {
        Self { tab_id, site }
    }
}

/// Terminal outcome for one tab of a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInjectionResult {
    pub tab_id: TabId,
    pub site_id: SiteId,
    pub result: InjectionResult,
}

/// A site that never got as far as a tab.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedSite {
    pub site_id: SiteId,
    pub error: String,
}

/// Everything a broadcast produced, in site order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub results: Vec<BatchInjectionResult>,
    pub unresolved: Vec<UnresolvedSite>,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.results.len() + self.unresolved.len()
    }
}

/// Readiness of one site's tab.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteReadiness {
    pub site_id: SiteId,
    pub tab_id: Option<TabId>,
    pub readiness: ReadinessResult,
}

/// Retry and timing knobs for a batch. Deserializes from a partial config section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub tab_ready_timeout_ms: u64,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            tab_ready_timeout_ms: 15_000,
        }
    }
}

impl BatchPolicy {
    /// Linear backoff: `base_delay * attempt` after each failed attempt.
    pub fn retry_policy(&self, max_retries: u32) -> RetryPolicy {
        RetryPolicy::linear(max_retries, Duration::from_millis(self.base_delay_ms))
    }

    pub fn tab_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.tab_ready_timeout_ms)
    }
}
