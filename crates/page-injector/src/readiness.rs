use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use promptcast_sites::SiteConfig;
use tracing::{debug, instrument, warn};

use crate::locator::{find_first_visible, LocatedElement};
use crate::model::{ReadinessDetails, ReadinessResult};
use crate::policy::InjectionPolicy;
use crate::ports::{PagePort, WatchId};
use crate::retry::{retry, RetryPolicy};

/// Visible input element for `site`, if any.
pub async fn find_input(page: &dyn PagePort, site: &SiteConfig) -> Option<LocatedElement> {
    find_first_visible(page, &site.input_selectors).await
}

/// One-shot readiness observation: the document finished loading and an input is visible.
pub async fn check(page: &dyn PagePort, site: &SiteConfig) -> ReadinessResult {
    let descriptor = match page.describe_page().await {
        Ok(descriptor) => descriptor,
        Err(err) => return ReadinessResult::not_ready(format!("page unreachable: {err}"), None),
    };
    let located = find_input(page, site).await;
    let complete = descriptor.is_complete();
    let ready_state = descriptor.ready_state.clone();
    let details = ReadinessDetails {
        page: descriptor,
        input_found: located.is_some(),
        selector: located.map(|found| found.selector),
    };
    if !complete {
        ReadinessResult::not_ready(format!("document is still {ready_state}"), Some(details))
    } else if !details.input_found {
        ReadinessResult::not_ready("no visible input matched", Some(details))
    } else {
        ReadinessResult::ready(details)
    }
}

/// Repeat [`check`] up to `max_attempts` times, `delay` apart, stopping at the first ready
/// observation. Returns the last observation; zero attempts observe nothing.
pub async fn check_with_retries(
    page: &dyn PagePort,
    site: &SiteConfig,
    max_attempts: u32,
    delay: Duration,
) -> ReadinessResult {
    if max_attempts == 0 {
        return ReadinessResult::not_ready("readiness polling is disabled", None);
    }
    let outcome = retry(RetryPolicy::fixed(max_attempts, delay), move |_| async move {
        let result = check(page, site).await;
        if result.ready {
            Ok(result)
        } else {
            Err(result)
        }
    })
    .await;
    debug!(target: "injector", site = %site.id, attempts = outcome.attempts, "readiness polled");
    match outcome.result {
        Ok(result) | Err(result) => result,
    }
}

/// A mutation watch registered in the page.
///
/// The watch is disconnected explicitly with [`MutationWatch::disconnect`]; a watch dropped
/// while still armed is cancelled on the current runtime.
pub struct MutationWatch {
    page: Arc<dyn PagePort>,
    id: WatchId,
    armed: AtomicBool,
}

impl MutationWatch {
    pub fn new(page: Arc<dyn PagePort>) -> Self {
        Self {
            page,
            id: WatchId::generate(),
            armed: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &WatchId {
        &self.id
    }

    /// `true` once a matching node is added. Errors count as "nothing observed".
    pub async fn wait(&self, selectors: &[String], timeout: Duration) -> bool {
        match self.page.watch_for_added(&self.id, selectors, timeout).await {
            Ok(seen) => seen,
            Err(err) => {
                debug!(target: "injector", watch = %self.id.0, error = %err, "mutation watch failed");
                false
            }
        }
    }

    pub async fn disconnect(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Err(err) = self.page.cancel_watch(&self.id).await {
                debug!(target: "injector", watch = %self.id.0, error = %err, "cancel watch failed");
            }
        }
    }
}

impl Drop for MutationWatch {
    fn drop(&mut self) {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let page = Arc::clone(&self.page);
                let id = self.id.clone();
                handle.spawn(async move {
                    let _ = page.cancel_watch(&id).await;
                });
            }
            Err(_) => warn!(target: "injector", watch = %self.id.0, "watch dropped outside a runtime"),
        }
    }
}

/// Wait for the site's input to become available.
///
/// A bounded locate poll races a mutation watch; whichever sees a usable element first wins.
/// Neither side gives up for the other: an exhausted poll keeps waiting on the watch, and a
/// watch that fires on a still-invisible element lets the poll carry on. The watch is always
/// disconnected before returning.
#[instrument(skip_all, fields(site = %site.id))]
pub async fn wait_for_input(
    page: Arc<dyn PagePort>,
    site: &SiteConfig,
    policy: &InjectionPolicy,
) -> Option<LocatedElement> {
    let watch = MutationWatch::new(Arc::clone(&page));
    let port = page.as_ref();

    let polled = async {
        retry(policy.locate_retry(), move |_| async move {
            find_input(port, site).await.ok_or(())
        })
        .await
        .result
        .ok()
    };
    let observed = watch.wait(&site.input_selectors, policy.observer_timeout());
    tokio::pin!(polled);
    tokio::pin!(observed);

    let mut poll_done = false;
    let mut watch_done = false;
    let found = loop {
        if poll_done && watch_done {
            break None;
        }
        tokio::select! {
            found = &mut polled, if !poll_done => {
                poll_done = true;
                if found.is_some() {
                    break found;
                }
            }
            seen = &mut observed, if !watch_done => {
                watch_done = true;
                if seen {
                    if let Some(found) = find_input(port, site).await {
                        debug!(target: "injector", selector = %found.selector, "input appeared");
                        break Some(found);
                    }
                }
            }
        }
    };

    watch.disconnect().await;
    found
}
