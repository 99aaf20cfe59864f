use std::sync::Arc;

use chrono::Utc;
use promptcast_sites::SiteConfig;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::errors::InjectError;
use crate::model::{
    ElementDescriptor, InjectionDetails, InjectionResult, PageDescriptor,
};
use crate::policy::InjectionPolicy;
use crate::ports::PagePort;
use crate::{readiness, stop, strategies, submit};

/// Reject messages the engine will not send.
pub(crate) fn validate_message(message: &str, policy: &InjectionPolicy) -> Result<(), InjectError> {
    if message.trim().is_empty() {
        return Err(InjectError::InvalidMessage("message is empty".into()));
    }
    let chars = message.chars().count();
    if chars > policy.max_message_len {
        return Err(InjectError::InvalidMessage(format!(
            "message has {chars} characters; the limit is {}",
            policy.max_message_len
        )));
    }
    Ok(())
}

/// One full injection in one page: stop, locate, write, submit.
///
/// Never fails outright; every problem becomes a failed [`InjectionResult`] carrying whatever
/// details were gathered up to that point.
#[instrument(skip_all, fields(site = %site.id, attempt = attempt))]
pub(crate) async fn execute(
    page: Arc<dyn PagePort>,
    site: &SiteConfig,
    message: &str,
    attempt: u32,
    policy: &InjectionPolicy,
) -> InjectionResult {
    let clock = Instant::now();
    let port = page.as_ref();
    let descriptor = port
        .describe_page()
        .await
        .unwrap_or_else(|_| PageDescriptor::unknown());
    let mut details = InjectionDetails::new(Utc::now(), descriptor, attempt);

    let outcome = run_steps(Arc::clone(&page), site, message, policy, &mut details, clock).await;
    if let Err(err) = port.release().await {
        debug!(target: "injector", error = %err, "releasing element handles failed");
    }
    details.timing.total_ms = elapsed_ms(clock);

    match outcome {
        Ok(()) => InjectionResult::succeeded(details),
        Err(err) => {
            warn!(target: "injector", site = %site.id, attempt, error = %err, "injection failed");
            InjectionResult::failed(err.to_string(), details)
        }
    }
}

async fn run_steps(
    page: Arc<dyn PagePort>,
    site: &SiteConfig,
    message: &str,
    policy: &InjectionPolicy,
    details: &mut InjectionDetails,
    clock: Instant,
) -> Result<(), InjectError> {
    validate_message(message, policy)?;
    let port = page.as_ref();

    details.stop_triggered = stop::stop_if_generating(port, site, policy).await;

    let located = readiness::wait_for_input(Arc::clone(&page), site, policy).await;
    details.timing.wait_ms = elapsed_ms(clock);
    let input = located.ok_or_else(|| InjectError::NotFound("input".into()))?;

    let info = port.inspect(&input.element).await?;
    details.element = Some(ElementDescriptor {
        tag: info.tag.to_ascii_lowercase(),
        id: info.id.clone(),
        classes: info.classes.clone(),
        selector: input.selector.clone(),
        kind: info.kind(),
    });

    let method = strategies::inject(port, &input.element, &info, message, site, policy).await?;
    details.timing.method = Some(method);

    let record = submit::submit_or_enter(port, &input.element, site, policy).await?;
    details.submitted = true;
    details.submission = Some(record.method);
    details.submit_selector = record.selector;
    Ok(())
}

fn elapsed_ms(clock: Instant) -> u64 {
    clock.elapsed().as_millis() as u64
}
