//! Concurrent fan-out of one message over resolved tabs.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use page_injector::{retry, InjectionDetails, InjectionResult, Injector, PageDescriptor};
use tracing::{debug, info, instrument, warn};

use crate::metrics;
use crate::model::{BatchInjectionResult, BatchPolicy, TabJob};
use crate::ports::TabManager;

pub struct BatchExecutor {
    injector: Arc<dyn Injector>,
    tabs: Arc<dyn TabManager>,
    policy: BatchPolicy,
}

impl BatchExecutor {
    pub fn new(injector: Arc<dyn Injector>, tabs: Arc<dyn TabManager>, policy: BatchPolicy) -> Self {
        Self {
            injector,
            tabs,
            policy,
        }
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Run every job concurrently. The output has one entry per job, in input order.
    pub async fn execute_batch(
        &self,
        message: &str,
        jobs: &[TabJob],
        max_retries: u32,
    ) -> Vec<BatchInjectionResult> {
        metrics::record_batch();
        info!(target: "broadcast", tabs = jobs.len(), max_retries, "executing batch");
        join_all(jobs.iter().map(|job| self.run_job(message, job, max_retries))).await
    }

    #[instrument(skip_all, fields(site = %job.site.id, tab = %job.tab_id))]
    async fn run_job(&self, message: &str, job: &TabJob, max_retries: u32) -> BatchInjectionResult {
        let outcome = retry(self.policy.retry_policy(max_retries), |attempt| {
            self.attempt(message, job, attempt)
        })
        .await;

        let result = match outcome.result {
            Ok(result) => {
                debug!(target: "broadcast", attempts = outcome.attempts, "tab succeeded");
                result
            }
            Err(last) => {
                warn!(
                    target: "broadcast",
                    attempts = outcome.attempts,
                    error = last.error.as_deref().unwrap_or("unknown"),
                    "tab failed after retries"
                );
                terminal_failure(last, outcome.attempts)
            }
        };
        metrics::record_outcome(job.site.id.as_str(), result.success);
        BatchInjectionResult {
            tab_id: job.tab_id,
            site_id: job.site.id.clone(),
            result,
        }
    }

    async fn attempt(
        &self,
        message: &str,
        job: &TabJob,
        attempt: u32,
    ) -> Result<InjectionResult, InjectionResult> {
        metrics::record_attempt(job.site.id.as_str());
        let page = match self.tabs.page(job.tab_id).await {
            Ok(page) => page,
            Err(err) => {
                debug!(target: "broadcast", attempt, error = %err, "tab unreachable");
                let details = InjectionDetails::new(Utc::now(), PageDescriptor::unknown(), attempt);
                return Err(InjectionResult::failed(err.to_string(), details));
            }
        };
        let result = self
            .injector
            .inject_message(page, &job.site, message, attempt)
            .await;
        if result.success {
            Ok(result)
        } else {
            Err(result)
        }
    }
}

/// The last failed attempt, relabelled as the job's final answer.
fn terminal_failure(mut last: InjectionResult, attempts: u32) -> InjectionResult {
    let reason = last.error.take().unwrap_or_else(|| "unknown error".to_string());
    last.error = Some(if attempts > 1 {
        format!("failed after {attempts} attempts: {reason}")
    } else {
        reason
    });
    last.success = false;
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTabs, ScriptedInjector};
    use page_injector::testing::{FakeElement, FakePage};
    use page_injector::{InjectionPolicy, PageInjector, SubmissionMethod};
    use promptcast_core_types::TabId;
    use promptcast_sites::SiteConfig;
    use std::time::Duration;
    use tokio::time::Instant;

    fn site(id: &str) -> SiteConfig {
        SiteConfig::new(id, id.to_uppercase(), format!("https://{id}.test/"))
            .with_inputs(&["textarea"])
            .with_submits(&["button#send"])
    }

    #[tokio::test(start_paused = true)]
    async fn aggregates_results_in_input_order() {
        let injector = Arc::new(
            ScriptedInjector::new()
                .script("a", &[true])
                .script("b", &[false, false, false])
                .script("c", &[false, true]),
        );
        let tabs = Arc::new(FakeTabs::new());
        let jobs = vec![
            TabJob::new(TabId(1), site("a")),
            TabJob::new(TabId(2), site("b")),
            TabJob::new(TabId(3), site("c")),
        ];
        for job in &jobs {
            tabs.insert(job.tab_id, Arc::new(FakePage::new()));
        }
        let executor = BatchExecutor::new(injector.clone(), tabs, BatchPolicy::default());

        let started = Instant::now();
        let results = executor.execute_batch("hello", &jobs, 3).await;

        let tabs: Vec<TabId> = results.iter().map(|r| r.tab_id).collect();
        assert_eq!(tabs, vec![TabId(1), TabId(2), TabId(3)]);
        let failures: Vec<_> = results.iter().filter(|r| !r.result.success).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].site_id.as_str(), "b");
        assert!(failures[0]
            .result
            .error
            .as_deref()
            .unwrap()
            .starts_with("failed after 3 attempts"));
        assert_eq!(results[2].result.details.attempt, 2);
        assert_eq!(injector.attempts("b"), vec![1, 2, 3]);
        // Linear backoff for b: 1s then 2s, concurrent with the others.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_tab_yields_unknown_page_context() {
        let injector = Arc::new(ScriptedInjector::new());
        let tabs = Arc::new(FakeTabs::new());
        let executor = BatchExecutor::new(injector.clone(), tabs, BatchPolicy::default());

        let results = executor
            .execute_batch("hello", &[TabJob::new(TabId(9), site("a"))], 2)
            .await;
        let result = &results[0].result;
        assert!(!result.success);
        assert_eq!(result.details.page.title, "Unknown");
        assert_eq!(result.details.page.url, "Unknown");
        assert!(result.error.as_deref().unwrap().contains("tab#9"));
        assert!(injector.attempts("a").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_still_attempts_once() {
        let injector = Arc::new(ScriptedInjector::new().script("a", &[false]));
        let tabs = Arc::new(FakeTabs::new());
        tabs.insert(TabId(1), Arc::new(FakePage::new()));
        let executor = BatchExecutor::new(injector.clone(), tabs, BatchPolicy::default());

        let results = executor
            .execute_batch("hello", &[TabJob::new(TabId(1), site("a"))], 0)
            .await;
        assert_eq!(injector.attempts("a"), vec![1]);
        assert_eq!(results[0].result.error.as_deref(), Some("scripted failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn real_engine_fills_every_tab() {
        let tabs = Arc::new(FakeTabs::new());
        let mut pages = Vec::new();
        for tab in 1..=2 {
            let page = Arc::new(FakePage::new());
            let input = page.add(FakeElement::textarea().matching(&["textarea"]));
            page.add(FakeElement::button().matching(&["button#send"]));
            tabs.insert(TabId(tab), page.clone());
            pages.push((page, input));
        }
        let injector = Arc::new(PageInjector::new(InjectionPolicy::default()));
        let executor = BatchExecutor::new(injector, tabs, BatchPolicy::default());
        let jobs = vec![
            TabJob::new(TabId(1), site("a")),
            TabJob::new(TabId(2), site("b")),
        ];

        let results = executor.execute_batch("same prompt", &jobs, 3).await;
        assert!(results.iter().all(|r| r.result.success));
        assert!(results
            .iter()
            .all(|r| r.result.details.submission == Some(SubmissionMethod::Click)));
        for (page, input) in pages {
            assert_eq!(page.value(&input), "same prompt");
        }
    }
}
