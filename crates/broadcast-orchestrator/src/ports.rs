use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use page_injector::PagePort;
use promptcast_core_types::TabId;
use promptcast_sites::SiteConfig;

use crate::errors::TabError;

/// Tab lifecycle as the broadcaster needs it.
#[async_trait]
pub trait TabManager: Send + Sync {
    /// Reuse an open tab whose host matches the site, or open one at the site's URL.
    async fn resolve_tab(&self, site: &SiteConfig) -> Result<TabId, TabError>;

    /// Bring the tab to the front.
    async fn activate(&self, tab: TabId) -> Result<(), TabError>;

    /// Wait until the tab's document reports `complete`.
    async fn wait_until_ready(&self, tab: TabId, timeout: Duration) -> Result<(), TabError>;

    /// Page-context access for the injection engine.
    async fn page(&self, tab: TabId) -> Result<Arc<dyn PagePort>, TabError>;
}
