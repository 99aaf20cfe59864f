use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broadcast_orchestrator::{TabError, TabManager};
use cdp_adapter::{AdapterErrorKind, Cdp, PageId, RawEvent, WaitGate};
use page_injector::PagePort;
use parking_lot::Mutex;
use promptcast_core_types::TabId;
use promptcast_sites::SiteConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::page::CdpPage;

#[derive(Default)]
struct TabTable {
    next: u64,
    pages: HashMap<TabId, PageId>,
}

impl TabTable {
    fn tab_for(&mut self, page: PageId) -> TabId {
        if let Some((tab, _)) = self.pages.iter().find(|(_, known)| **known == page) {
            return *tab;
        }
        self.next += 1;
        let tab = TabId(self.next);
        self.pages.insert(tab, page);
        tab
    }

    fn forget(&mut self, page: PageId) -> Option<TabId> {
        let tab = self
            .pages
            .iter()
            .find(|(_, known)| **known == page)
            .map(|(tab, _)| *tab)?;
        self.pages.remove(&tab);
        Some(tab)
    }
}

/// Maps broadcaster tab ids onto adapter pages.
pub struct CdpTabManager {
    cdp: Arc<dyn Cdp>,
    table: Mutex<TabTable>,
}

impl CdpTabManager {
    pub fn new(cdp: Arc<dyn Cdp>) -> Self {
        Self {
            cdp,
            table: Mutex::new(TabTable::default()),
        }
    }

    fn page_id(&self, tab: TabId) -> Result<PageId, TabError> {
        self.table
            .lock()
            .pages
            .get(&tab)
            .copied()
            .ok_or(TabError::Closed(tab))
    }

    /// Drop tab ids whose page the browser reports closed.
    pub fn track_lifecycle(self: &Arc<Self>, mut events: broadcast::Receiver<RawEvent>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(RawEvent::PageLifecycle { page, phase, .. }) if phase == "closed" => {
                        if let Some(tab) = manager.table.lock().forget(page) {
                            debug!(target: "bridge", %tab, "tab closed");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "bridge", skipped, "lifecycle events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[async_trait]
impl TabManager for CdpTabManager {
    async fn resolve_tab(&self, site: &SiteConfig) -> Result<TabId, TabError> {
        let existing = self.cdp.pages().into_iter().find(|info| {
            info.url
                .as_deref()
                .is_some_and(|url| site.matches_url(url))
        });
        if let Some(info) = existing {
            let tab = self.table.lock().tab_for(info.page);
            debug!(target: "bridge", site = %site.id, %tab, "reusing open tab");
            return Ok(tab);
        }

        let page = self
            .cdp
            .create_page(&site.url)
            .await
            .map_err(|err| TabError::OpenFailed {
                site: site.id.clone(),
                reason: err.to_string(),
            })?;
        let tab = self.table.lock().tab_for(page);
        info!(target: "bridge", site = %site.id, %tab, url = %site.url, "opened tab");
        Ok(tab)
    }

    async fn activate(&self, tab: TabId) -> Result<(), TabError> {
        let page = self.page_id(tab)?;
        self.cdp
            .activate_page(page)
            .await
            .map_err(|err| TabError::Browser(err.to_string()))
    }

    async fn wait_until_ready(&self, tab: TabId, timeout: Duration) -> Result<(), TabError> {
        let page = self.page_id(tab)?;
        match self.cdp.wait_basic(page, WaitGate::Load, timeout).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind == AdapterErrorKind::NavTimeout => Err(TabError::NotReady {
                tab,
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(err) if err.kind == AdapterErrorKind::TargetNotFound => Err(TabError::Closed(tab)),
            Err(err) => Err(TabError::Browser(err.to_string())),
        }
    }

    async fn page(&self, tab: TabId) -> Result<Arc<dyn PagePort>, TabError> {
        let page = self.page_id(tab)?;
        if !self.cdp.pages().iter().any(|info| info.page == page) {
            self.table.lock().forget(page);
            return Err(TabError::Closed(tab));
        }
        Ok(Arc::new(CdpPage::new(Arc::clone(&self.cdp), page)))
    }
}
