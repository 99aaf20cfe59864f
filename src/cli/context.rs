use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use broadcast_orchestrator::{BatchPolicy, Broadcaster};
use cdp_adapter::{event_bus, Cdp, CdpAdapter};
use page_injector::PageInjector;
use promptcast_sites::{JsonFilePreferences, SiteRegistry};
use tokio::sync::OnceCell;
use tracing::info;

use super::output::OutputFormat;
use crate::bridge::CdpTabManager;
use crate::config::{Config, ENV_CHROME, ENV_WS_URL};
use crate::history::InputHistory;

const EVENT_BUFFER: usize = 256;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    output: OutputFormat,
    browser: OnceCell<Arc<CdpAdapter>>,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
            browser: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    pub fn registry(&self) -> Result<SiteRegistry> {
        let store = Arc::new(JsonFilePreferences::new(self.config.preferences_file()));
        Ok(SiteRegistry::with_builtin(self.config.sites.clone(), store)?)
    }

    pub async fn history(&self) -> Result<InputHistory> {
        InputHistory::load(self.config.history_file(), self.config.history.capacity).await
    }

    /// Started adapter, launched or connected on first use.
    pub async fn browser(&self) -> Result<Arc<CdpAdapter>> {
        self.browser
            .get_or_try_init(|| async {
                let (bus, _rx) = event_bus(EVENT_BUFFER);
                let adapter = Arc::new(CdpAdapter::new(self.config.cdp.clone(), bus));
                if adapter.mode().is_stub() {
                    bail!(
                        "no Chrome or Chromium found; set {ENV_CHROME} or point {ENV_WS_URL} at a running browser"
                    );
                }
                Arc::clone(&adapter).start().await?;
                info!(mode = adapter.mode().as_str(), "browser ready");
                Ok(adapter)
            })
            .await
            .map(Arc::clone)
    }

    pub async fn broadcaster(&self, policy: BatchPolicy) -> Result<Broadcaster> {
        let adapter = self.browser().await?;
        let cdp: Arc<dyn Cdp> = adapter.clone();
        let tabs = Arc::new(CdpTabManager::new(cdp));
        tabs.track_lifecycle(adapter.subscribe());
        let injector = Arc::new(PageInjector::new(self.config.injection.clone()));
        Ok(Broadcaster::new(
            Arc::new(self.registry()?),
            tabs,
            injector,
            policy,
        ))
    }

    /// Stop the adapter's background tasks. Tabs stay open in the browser.
    pub async fn shutdown(&self) {
        if let Some(adapter) = self.browser.get() {
            adapter.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptcast_core_types::SiteId;
    use tempfile::TempDir;

    #[test]
    fn registry_and_history_follow_configured_paths() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.preferences_path = Some(dir.path().join("state").join("prefs.json"));
        config.history.path = Some(dir.path().join("history.json"));
        let ctx = CliContext::new(config, dir.path().join("config.yaml"), OutputFormat::Human);

        let registry = ctx.registry().unwrap();
        registry.set_enabled(&SiteId::new("grok"), false).unwrap();
        assert!(dir.path().join("state").join("prefs.json").exists());
        assert!(!ctx.registry().unwrap().is_enabled(&SiteId::new("grok")).unwrap());

        let history = tokio_test::block_on(ctx.history()).unwrap();
        assert!(history.is_empty());
        assert_eq!(history.path(), dir.path().join("history.json"));
    }
}
