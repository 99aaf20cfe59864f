use promptcast_sites::SiteConfig;
use tracing::{debug, info, instrument, warn};

use crate::locator::find_clickable;
use crate::policy::InjectionPolicy;
use crate::ports::PagePort;
use crate::retry::poll_until;

/// Halt an in-progress response before a new message goes in.
///
/// Returns `true` when a stop control was clicked, even if it never disappeared within the
/// timeout. A site without stop selectors is never touched.
#[instrument(skip_all, fields(site = %site.id))]
pub async fn stop_if_generating(
    page: &dyn PagePort,
    site: &SiteConfig,
    policy: &InjectionPolicy,
) -> bool {
    if site.stop_selectors.is_empty() {
        return false;
    }
    let Some(control) = find_clickable(page, &site.stop_selectors).await else {
        return false;
    };
    if let Err(err) = page.click(&control.element).await {
        warn!(target: "injector", selector = %control.selector, error = %err, "stop click failed");
        return false;
    }
    info!(target: "injector", selector = %control.selector, "stopped in-progress generation");

    let selectors = &site.stop_selectors;
    let outcome = poll_until(
        policy.stop_poll_interval(),
        policy.stop_timeout(),
        move || async move { find_clickable(page, selectors).await.is_none() },
    )
    .await;
    if !outcome.satisfied {
        debug!(target: "injector", waited_ms = outcome.waited.as_millis() as u64, "stop control still present");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeElement, FakePage};
    use std::time::Duration;
    use tokio::time::Instant;

    fn site(stops: &[&str]) -> SiteConfig {
        SiteConfig::new("demo", "Demo", "https://demo.test/")
            .with_inputs(&["textarea"])
            .with_stops(stops)
    }

    #[tokio::test]
    async fn no_stop_selectors_means_no_clicks() {
        let page = FakePage::new();
        let button = page.add(FakeElement::button().matching(&["button"]));
        assert!(!stop_if_generating(&page, &site(&[]), &InjectionPolicy::default()).await);
        assert_eq!(page.clicks(&button), 0);
        assert_eq!(page.query_count("button"), 0);
    }

    #[tokio::test]
    async fn idle_page_is_left_alone() {
        let page = FakePage::new();
        assert!(!stop_if_generating(&page, &site(&["button.stop"]), &InjectionPolicy::default()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn clicks_and_waits_for_the_control_to_go_away() {
        let page = FakePage::new();
        let stop = page.add(
            FakeElement::button()
                .matching(&["button.stop"])
                .removed_after_click(Duration::from_millis(100)),
        );
        let started = Instant::now();
        assert!(stop_if_generating(&page, &site(&["button.stop"]), &InjectionPolicy::default()).await);
        assert_eq!(page.clicks(&stop), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_control_times_out_but_still_counts() {
        let page = FakePage::new();
        let stop = page.add(FakeElement::button().matching(&["button.stop"]));
        let started = Instant::now();
        assert!(stop_if_generating(&page, &site(&["button.stop"]), &InjectionPolicy::default()).await);
        assert_eq!(page.clicks(&stop), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
