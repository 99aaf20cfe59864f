//! Top-level send flow: pick sites, resolve their tabs, fan out, summarize.

use std::sync::Arc;

use futures::future::join_all;
use page_injector::{InjectError, Injector, ReadinessResult};
use promptcast_core_types::{SiteId, TabId};
use promptcast_sites::{SiteConfig, SiteRegistry};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{summarize, BatchSummary};
use crate::batch::BatchExecutor;
use crate::errors::{BroadcastError, TabError};
use crate::metrics;
use crate::model::{BatchPolicy, BroadcastReport, SiteReadiness, TabJob, UnresolvedSite};
use crate::ports::TabManager;

/// A broadcast that reached at least one site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub report: BroadcastReport,
    pub summary: BatchSummary,
}

pub struct Broadcaster {
    registry: Arc<SiteRegistry>,
    tabs: Arc<dyn TabManager>,
    injector: Arc<dyn Injector>,
    executor: BatchExecutor,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<SiteRegistry>,
        tabs: Arc<dyn TabManager>,
        injector: Arc<dyn Injector>,
        policy: BatchPolicy,
    ) -> Self {
        let executor = BatchExecutor::new(injector.clone(), tabs.clone(), policy);
        Self {
            registry,
            tabs,
            injector,
            executor,
        }
    }

    pub fn registry(&self) -> &Arc<SiteRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &BatchPolicy {
        self.executor.policy()
    }

    /// Broadcast and fold the outcome. Errors only when nothing could be sent at all.
    pub async fn send(
        &self,
        message: &str,
        subset: Option<&[SiteId]>,
    ) -> Result<Delivery, BroadcastError> {
        let report = self.broadcast(message, subset).await?;
        let summary = summarize(&report)?;
        Ok(Delivery { report, summary })
    }

    /// Send `message` to every eligible site (optionally only `subset`) and collect the raw
    /// per-site results.
    #[instrument(skip_all, fields(chars = message.chars().count()))]
    pub async fn broadcast(
        &self,
        message: &str,
        subset: Option<&[SiteId]>,
    ) -> Result<BroadcastReport, BroadcastError> {
        self.injector
            .validate_message(message)
            .map_err(invalid_message)?;
        let sites = self.registry.eligible_sites(subset)?;
        if sites.is_empty() {
            return Err(BroadcastError::NoSites);
        }
        info!(target: "broadcast", sites = sites.len(), "broadcasting message");

        let (jobs, unresolved) = self.prepare_tabs(sites).await;
        let results = if jobs.is_empty() {
            Vec::new()
        } else {
            let max_retries = self.executor.policy().max_retries;
            self.executor
                .execute_batch(message, &jobs, max_retries)
                .await
        };
        Ok(BroadcastReport {
            results,
            unresolved,
        })
    }

    /// Readiness of every eligible site's tab, in display order. Opens tabs as needed but never
    /// writes to a page.
    pub async fn check(&self, subset: Option<&[SiteId]>) -> Result<Vec<SiteReadiness>, BroadcastError> {
        let sites = self.registry.eligible_sites(subset)?;
        if sites.is_empty() {
            return Err(BroadcastError::NoSites);
        }
        let (jobs, unresolved) = self.prepare_tabs(sites.clone()).await;
        let observed = join_all(jobs.iter().map(|job| self.observe(job))).await;

        let mut out = Vec::with_capacity(sites.len());
        for site in sites {
            if let Some(readiness) = observed.iter().find(|r| r.site_id == site.id) {
                out.push(readiness.clone());
            } else if let Some(failed) = unresolved.iter().find(|u| u.site_id == site.id) {
                out.push(SiteReadiness {
                    site_id: site.id,
                    tab_id: None,
                    readiness: ReadinessResult::not_ready(failed.error.clone(), None),
                });
            }
        }
        Ok(out)
    }

    async fn observe(&self, job: &TabJob) -> SiteReadiness {
        let readiness = match self.tabs.page(job.tab_id).await {
            Ok(page) => self.injector.check_readiness(page, &job.site).await,
            Err(err) => ReadinessResult::not_ready(err.to_string(), None),
        };
        debug!(target: "broadcast", site = %job.site.id, ready = readiness.ready, "observed readiness");
        SiteReadiness {
            site_id: job.site.id.clone(),
            tab_id: Some(job.tab_id),
            readiness,
        }
    }

    /// Tabs are resolved one site at a time; the browser handles concurrent tab creation
    /// poorly.
    async fn prepare_tabs(&self, sites: Vec<SiteConfig>) -> (Vec<TabJob>, Vec<UnresolvedSite>) {
        let mut jobs = Vec::with_capacity(sites.len());
        let mut unresolved = Vec::new();
        for site in sites {
            match self.prepare_tab(&site).await {
                Ok(tab) => jobs.push(TabJob::new(tab, site)),
                Err(err) => {
                    warn!(target: "broadcast", site = %site.id, error = %err, "could not prepare tab");
                    metrics::record_unresolved(site.id.as_str());
                    unresolved.push(UnresolvedSite {
                        site_id: site.id,
                        error: err.to_string(),
                    });
                }
            }
        }
        (jobs, unresolved)
    }

    async fn prepare_tab(&self, site: &SiteConfig) -> Result<TabId, TabError> {
        let tab = self.tabs.resolve_tab(site).await?;
        self.tabs.activate(tab).await?;
        match self
            .tabs
            .wait_until_ready(tab, self.executor.policy().tab_ready_timeout())
            .await
        {
            Ok(()) => {}
            // A slow load is not fatal; the injection engine waits for its input anyway.
            Err(err @ TabError::NotReady { .. }) => {
                warn!(target: "broadcast", site = %site.id, error = %err, "proceeding before load completed");
            }
            Err(err) => return Err(err),
        }
        debug!(target: "broadcast", site = %site.id, %tab, "tab prepared");
        Ok(tab)
    }
}

fn invalid_message(err: InjectError) -> BroadcastError {
    match err {
        InjectError::InvalidMessage(reason) => BroadcastError::InvalidMessage(reason),
        other => BroadcastError::InvalidMessage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTabs, ScriptedInjector};
    use page_injector::testing::{FakeElement, FakePage};
    use page_injector::PageInjector;
    use promptcast_sites::MemoryPreferences;

    fn site(id: &str) -> SiteConfig {
        SiteConfig::new(id, id.to_uppercase(), format!("https://{id}.test/"))
            .with_inputs(&["textarea"])
            .with_submits(&["button#send"])
    }

    fn registry(sites: Vec<SiteConfig>) -> Arc<SiteRegistry> {
        Arc::new(SiteRegistry::new(sites, Arc::new(MemoryPreferences::default())).unwrap())
    }

    fn chat_page() -> Arc<FakePage> {
        let page = Arc::new(FakePage::new());
        page.add(FakeElement::textarea().matching(&["textarea"]));
        page.add(FakeElement::button().matching(&["button#send"]));
        page
    }

    #[tokio::test(start_paused = true)]
    async fn partial_delivery_reports_each_site() {
        let tabs = Arc::new(FakeTabs::new());
        tabs.route("a", TabId(1), Arc::new(FakePage::new()));
        tabs.route("b", TabId(2), Arc::new(FakePage::new()));
        let injector = Arc::new(ScriptedInjector::new().script("b", &[false]));
        let broadcaster = Broadcaster::new(
            registry(vec![site("a"), site("b"), site("c")]),
            tabs.clone(),
            injector,
            BatchPolicy::default(),
        );

        let delivery = broadcaster.send("hi", None).await.unwrap();
        assert_eq!(delivery.report.results.len(), 2);
        assert_eq!(delivery.report.unresolved.len(), 1);
        assert_eq!(delivery.report.unresolved[0].site_id.as_str(), "c");
        let failed: Vec<_> = delivery
            .summary
            .failures()
            .iter()
            .map(|f| f.site.as_str())
            .collect();
        assert_eq!(failed, vec!["c", "b"]);
        assert_eq!(
            &tabs.log()[..4],
            &["resolve:a", "activate:tab#1", "wait:tab#1", "resolve:b"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn every_site_failing_is_an_error() {
        let tabs = Arc::new(FakeTabs::new());
        tabs.route("a", TabId(1), Arc::new(FakePage::new()));
        let injector = Arc::new(ScriptedInjector::new().script("a", &[false]));
        let broadcaster = Broadcaster::new(
            registry(vec![site("a"), site("b")]),
            tabs,
            injector,
            BatchPolicy::default(),
        );

        let err = broadcaster.send("hi", None).await.unwrap_err();
        match err {
            BroadcastError::TotalBatchFailure { total, failures } => {
                assert_eq!(total, 2);
                assert!(failures[0].error.contains("no route"));
                assert!(failures[1].error.contains("after 3 attempts"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_tabs_are_touched() {
        let tabs = Arc::new(FakeTabs::new());
        let broadcaster = Broadcaster::new(
            registry(vec![site("a")]),
            tabs.clone(),
            Arc::new(PageInjector::default()),
            BatchPolicy::default(),
        );
        let err = broadcaster.send("   ", None).await.unwrap_err();
        assert!(matches!(err, BroadcastError::InvalidMessage(_)));
        assert!(tabs.log().is_empty());
    }

    #[tokio::test]
    async fn no_enabled_sites() {
        let broadcaster = Broadcaster::new(
            registry(vec![site("a").disabled()]),
            Arc::new(FakeTabs::new()),
            Arc::new(PageInjector::default()),
            BatchPolicy::default(),
        );
        let err = broadcaster.send("hi", None).await.unwrap_err();
        assert!(matches!(err, BroadcastError::NoSites));
        let err = broadcaster
            .send("hi", Some(&[SiteId::new("zzz")]))
            .await
            .unwrap_err();
        assert!(matches!(err, BroadcastError::Site(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tab_still_gets_the_message() {
        let tabs = Arc::new(FakeTabs::new());
        let page = chat_page();
        tabs.route("a", TabId(1), page.clone());
        tabs.never_ready(TabId(1));
        let policy = BatchPolicy {
            tab_ready_timeout_ms: 500,
            ..BatchPolicy::default()
        };
        let broadcaster = Broadcaster::new(
            registry(vec![site("a")]),
            tabs,
            Arc::new(PageInjector::default()),
            policy,
        );

        let delivery = broadcaster.send("hello", None).await.unwrap();
        assert_eq!(delivery.summary, BatchSummary::AllSucceeded { total: 1 });
        assert!(delivery.report.results[0].result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn subset_limits_the_broadcast() {
        let tabs = Arc::new(FakeTabs::new());
        tabs.route("a", TabId(1), chat_page());
        tabs.route("b", TabId(2), chat_page());
        let broadcaster = Broadcaster::new(
            registry(vec![site("a"), site("b")]),
            tabs.clone(),
            Arc::new(PageInjector::default()),
            BatchPolicy::default(),
        );
        let report = broadcaster
            .broadcast("hello", Some(&[SiteId::new("b")]))
            .await
            .unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].tab_id, TabId(2));
        assert!(!tabs.log().contains(&"resolve:a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn check_reports_in_site_order() {
        let tabs = Arc::new(FakeTabs::new());
        tabs.route("a", TabId(1), chat_page());
        tabs.route(
            "b",
            TabId(2),
            Arc::new(FakePage::new().with_ready_state("loading")),
        );
        let broadcaster = Broadcaster::new(
            registry(vec![site("a"), site("b"), site("c")]),
            tabs,
            Arc::new(PageInjector::default()),
            BatchPolicy {
                tab_ready_timeout_ms: 100,
                ..BatchPolicy::default()
            },
        );

        let report = broadcaster.check(None).await.unwrap();
        let ids: Vec<_> = report.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(report[0].readiness.ready);
        assert!(!report[1].readiness.ready);
        assert_eq!(report[2].tab_id, None);
        assert!(report[2]
            .readiness
            .reason
            .as_deref()
            .unwrap()
            .contains("no route"));
    }
}
