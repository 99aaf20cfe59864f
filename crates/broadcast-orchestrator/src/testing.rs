//! In-memory doubles for the orchestrator's ports.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use page_injector::testing::FakePage;
use page_injector::{
    InjectionDetails, InjectionResult, Injector, PageDescriptor, PagePort, ReadinessResult,
};
use parking_lot::Mutex;
use promptcast_core_types::TabId;
use promptcast_sites::SiteConfig;

use crate::errors::TabError;
use crate::ports::TabManager;

/// Tabs keyed by id, with an optional site-to-tab routing table for `resolve_tab`.
#[derive(Default)]
pub struct FakeTabs {
    pages: Mutex<HashMap<TabId, Arc<FakePage>>>,
    routes: Mutex<HashMap<String, TabId>>,
    slow: Mutex<HashSet<TabId>>,
    log: Mutex<Vec<String>>,
}

impl FakeTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tab: TabId, page: Arc<FakePage>) {
        self.pages.lock().insert(tab, page);
    }

    pub fn route(&self, site: &str, tab: TabId, page: Arc<FakePage>) {
        self.routes.lock().insert(site.to_string(), tab);
        self.insert(tab, page);
    }

    /// Make `wait_until_ready` time out for this tab.
    pub fn never_ready(&self, tab: TabId) {
        self.slow.lock().insert(tab);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl TabManager for FakeTabs {
    async fn resolve_tab(&self, site: &SiteConfig) -> Result<TabId, TabError> {
        self.log.lock().push(format!("resolve:{}", site.id));
        self.routes
            .lock()
            .get(site.id.as_str())
            .copied()
            .ok_or_else(|| TabError::OpenFailed {
                site: site.id.clone(),
                reason: "no route".into(),
            })
    }

    async fn activate(&self, tab: TabId) -> Result<(), TabError> {
        self.log.lock().push(format!("activate:{tab}"));
        Ok(())
    }

    async fn wait_until_ready(&self, tab: TabId, timeout: Duration) -> Result<(), TabError> {
        self.log.lock().push(format!("wait:{tab}"));
        if self.slow.lock().contains(&tab) {
            tokio::time::sleep(timeout).await;
            return Err(TabError::NotReady {
                tab,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn page(&self, tab: TabId) -> Result<Arc<dyn PagePort>, TabError> {
        let page = self.pages.lock().get(&tab).cloned();
        match page {
            Some(page) => Ok(page as Arc<dyn PagePort>),
            None => Err(TabError::Closed(tab)),
        }
    }
}

/// Injector whose per-attempt outcomes are scripted by site id.
///
/// Attempts past the end of a script repeat its last outcome; unscripted sites succeed.
#[derive(Default)]
pub struct ScriptedInjector {
    scripts: HashMap<String, Vec<bool>>,
    attempts: Mutex<HashMap<String, Vec<u32>>>,
}

impl ScriptedInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, site: &str, outcomes: &[bool]) -> Self {
        self.scripts.insert(site.to_string(), outcomes.to_vec());
        self
    }

    pub fn attempts(&self, site: &str) -> Vec<u32> {
        self.attempts.lock().get(site).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Injector for ScriptedInjector {
    async fn inject_message(
        &self,
        _page: Arc<dyn PagePort>,
        site: &SiteConfig,
        _message: &str,
        attempt: u32,
    ) -> InjectionResult {
        self.attempts
            .lock()
            .entry(site.id.as_str().to_string())
            .or_default()
            .push(attempt);
        let outcome = self
            .scripts
            .get(site.id.as_str())
            .map(|script| {
                let index = (attempt as usize).saturating_sub(1).min(script.len().saturating_sub(1));
                script.get(index).copied().unwrap_or(true)
            })
            .unwrap_or(true);
        let page = PageDescriptor {
            title: site.name.clone(),
            url: site.url.clone(),
            ready_state: "complete".into(),
        };
        let details = InjectionDetails::new(Utc::now(), page, attempt);
        if outcome {
            InjectionResult::succeeded(details)
        } else {
            InjectionResult::failed("scripted failure", details)
        }
    }

    async fn check_readiness(&self, _page: Arc<dyn PagePort>, _site: &SiteConfig) -> ReadinessResult {
        ReadinessResult::not_ready("scripted", None)
    }
}
