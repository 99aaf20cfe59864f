use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use promptcast_sites::SiteConfig;

use crate::errors::InjectError;
use crate::model::{InjectionResult, ReadinessResult};
use crate::policy::InjectionPolicy;
use crate::ports::PagePort;
use crate::{readiness, runner};

/// Entry point used by the broadcast layer for one tab.
#[async_trait]
pub trait Injector: Send + Sync {
    /// Stop any running generation, write `message` and submit it. `attempt` is recorded in
    /// the result details.
    async fn inject_message(
        &self,
        page: Arc<dyn PagePort>,
        site: &SiteConfig,
        message: &str,
        attempt: u32,
    ) -> InjectionResult;

    async fn check_readiness(&self, page: Arc<dyn PagePort>, site: &SiteConfig) -> ReadinessResult;

    /// Reject a message before any tab is touched.
    fn validate_message(&self, _message: &str) -> Result<(), InjectError> {
        Ok(())
    }
}

pub struct PageInjector {
    policy: InjectionPolicy,
}

impl PageInjector {
    pub fn new(policy: InjectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &InjectionPolicy {
        &self.policy
    }
}

impl Default for PageInjector {
    fn default() -> Self {
        Self::new(InjectionPolicy::default())
    }
}

#[async_trait]
impl Injector for PageInjector {
    async fn inject_message(
        &self,
        page: Arc<dyn PagePort>,
        site: &SiteConfig,
        message: &str,
        attempt: u32,
    ) -> InjectionResult {
        runner::execute(page, site, message, attempt, &self.policy).await
    }

    async fn check_readiness(&self, page: Arc<dyn PagePort>, site: &SiteConfig) -> ReadinessResult {
        readiness::check_with_retries(
            page.as_ref(),
            site,
            self.policy.locate_attempts,
            Duration::from_millis(self.policy.locate_delay_ms),
        )
        .await
    }

    fn validate_message(&self, message: &str) -> Result<(), InjectError> {
        runner::validate_message(message, &self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StrategyKind, SubmissionMethod};
    use crate::testing::{FakeElement, FakePage};
    use std::time::Duration;

    fn basic_site() -> SiteConfig {
        SiteConfig::new("demo", "Demo", "https://demo.test/")
            .with_inputs(&["textarea"])
            .with_submits(&["button#send"])
    }

    async fn inject(page: &Arc<FakePage>, site: &SiteConfig, message: &str) -> InjectionResult {
        let port: Arc<dyn PagePort> = page.clone();
        PageInjector::default()
            .inject_message(port, site, message, 1)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn textarea_and_enabled_button() {
        let page = Arc::new(FakePage::new());
        let input = page.add(FakeElement::textarea().matching(&["textarea"]));
        let send = page.add(FakeElement::button().matching(&["button#send"]));

        let result = inject(&page, &basic_site(), "hello").await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(page.value(&input), "hello");
        assert_eq!(page.clicks(&send), 1);
        assert_eq!(page.enter_count(), 0);

        let details = result.details;
        assert_eq!(details.timing.method, Some(StrategyKind::Form));
        assert_eq!(details.submission, Some(SubmissionMethod::Click));
        assert_eq!(details.submit_selector.as_deref(), Some("button#send"));
        assert_eq!(details.element.unwrap().tag, "textarea");
        assert_eq!(details.page.title, "Fake page");
        assert!(!details.stop_triggered);
        assert!(page.released());
    }

    #[tokio::test(start_paused = true)]
    async fn button_enabled_within_the_retry_budget() {
        // Three scans 200ms apart cover 400ms; the button enables at 250ms.
        let page = Arc::new(FakePage::new());
        page.add(FakeElement::textarea().matching(&["textarea"]));
        let send = page.add(
            FakeElement::button()
                .matching(&["button#send"])
                .disabled()
                .enabled_after(Duration::from_millis(250)),
        );
        // Zero settles so the enable delay is measured from the first submit scan.
        let policy = InjectionPolicy {
            focus_settle_ms: 0,
            post_inject_settle_ms: 0,
            ..InjectionPolicy::default()
        };
        let port: Arc<dyn PagePort> = page.clone();
        let result = PageInjector::new(policy)
            .inject_message(port, &basic_site(), "hello", 1)
            .await;
        assert!(result.success);
        assert_eq!(page.clicks(&send), 1);
        assert_eq!(result.details.submission, Some(SubmissionMethod::Click));
        assert_eq!(page.query_count("button#send"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn button_enabled_too_late_falls_back_to_enter() {
        let page = Arc::new(FakePage::new());
        page.add(FakeElement::textarea().matching(&["textarea"]));
        let send = page.add(
            FakeElement::button()
                .matching(&["button#send"])
                .disabled()
                .enabled_after(Duration::from_secs(5)),
        );
        let result = inject(&page, &basic_site(), "hello").await;
        assert!(result.success);
        assert_eq!(page.clicks(&send), 0);
        assert_eq!(page.enter_count(), 1);
        assert_eq!(result.details.submission, Some(SubmissionMethod::EnterKey));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_generation_before_injecting() {
        let page = Arc::new(FakePage::new());
        let input = page.add(FakeElement::textarea().matching(&["textarea"]));
        let stop = page.add(
            FakeElement::button()
                .matching(&["button.stop"])
                .removed_after_click(Duration::from_millis(100)),
        );
        let site = basic_site().with_stops(&["button.stop"]);
        let result = inject(&page, &site, "hello").await;
        assert!(result.success);
        assert!(result.details.stop_triggered);
        assert_eq!(page.clicks(&stop), 1);

        let log = page.log();
        let stop_click = log.iter().position(|op| op == &format!("click:{}", stop.0));
        let first_focus = log.iter().position(|op| op == &format!("focus:{}", input.0));
        assert!(stop_click < first_focus);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_input_is_a_failed_result() {
        let page = Arc::new(FakePage::new().with_title("Chat"));
        let policy = InjectionPolicy {
            locate_attempts: 2,
            locate_delay_ms: 100,
            observer_timeout_ms: 500,
            ..InjectionPolicy::default()
        };
        let port: Arc<dyn PagePort> = page.clone();
        let result = PageInjector::new(policy)
            .inject_message(port, &basic_site(), "hello", 2)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no visible input"));
        assert_eq!(result.details.attempt, 2);
        assert_eq!(result.details.page.title, "Chat");
        assert!(result.details.element.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_page_reports_unknown_context() {
        let page = Arc::new(FakePage::new());
        page.set_unreachable(true);
        let policy = InjectionPolicy {
            locate_attempts: 1,
            observer_timeout_ms: 100,
            ..InjectionPolicy::default()
        };
        let port: Arc<dyn PagePort> = page.clone();
        let result = PageInjector::new(policy)
            .inject_message(port, &basic_site(), "hello", 1)
            .await;
        assert!(!result.success);
        assert_eq!(result.details.page.url, "Unknown");
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_touching_the_page() {
        let page = Arc::new(FakePage::new());
        let input = page.add(FakeElement::textarea().matching(&["textarea"]));
        let result = inject(&page, &basic_site(), "   ").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid message"));
        assert_eq!(page.value(&input), "");
        assert_eq!(page.query_count("textarea"), 0);
    }

    #[test]
    fn injector_validates_against_its_policy() {
        let injector = PageInjector::new(InjectionPolicy {
            max_message_len: 3,
            ..InjectionPolicy::default()
        });
        assert!(injector.validate_message("abc").is_ok());
        assert!(injector.validate_message("abcd").is_err());
        assert!(injector.validate_message(" ").is_err());
    }

    #[tokio::test]
    async fn readiness_goes_through_the_injector() {
        let page = Arc::new(FakePage::new());
        page.add(FakeElement::textarea().matching(&["textarea"]));
        let port: Arc<dyn PagePort> = page.clone();
        let result = PageInjector::default()
            .check_readiness(port, &basic_site())
            .await;
        assert!(result.ready);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_polls_within_the_locate_budget() {
        let injector = PageInjector::new(InjectionPolicy {
            locate_attempts: 4,
            locate_delay_ms: 100,
            ..InjectionPolicy::default()
        });

        let late = Arc::new(FakePage::new());
        late.add(
            FakeElement::textarea()
                .matching(&["textarea"])
                .appears_after(Duration::from_millis(150)),
        );
        let port: Arc<dyn PagePort> = late.clone();
        assert!(injector.check_readiness(port, &basic_site()).await.ready);
        assert_eq!(late.query_count("textarea"), 3);

        let empty = Arc::new(FakePage::new());
        let port: Arc<dyn PagePort> = empty.clone();
        let started = tokio::time::Instant::now();
        let result = injector.check_readiness(port, &basic_site()).await;
        assert!(!result.ready);
        assert_eq!(empty.query_count("textarea"), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_enter_fallback_fails_the_attempt() {
        let page = Arc::new(FakePage::new());
        let input = page.add(FakeElement::textarea().matching(&["textarea"]).rejecting_enter());

        let result = inject(&page, &basic_site(), "hello").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("submission uncertain"));
        assert_eq!(page.value(&input), "hello");
        assert_eq!(page.enter_count(), 0);
        assert!(!result.details.submitted);
        assert_eq!(result.details.submission, None);
    }
}
