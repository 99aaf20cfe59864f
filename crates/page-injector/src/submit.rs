use promptcast_sites::SiteConfig;
use tracing::{debug, info, instrument, warn};

use crate::errors::{InjectError, PageError};
use crate::locator::find_clickable;
use crate::model::{DomEvent, ElementRef, SubmissionMethod};
use crate::policy::InjectionPolicy;
use crate::ports::PagePort;
use crate::retry::retry;

/// Result of looking for and clicking a submit control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Clicked { selector: String, attempts: u32 },
    NoControl { attempts: u32 },
}

/// How the message was finally sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub method: SubmissionMethod,
    pub selector: Option<String>,
}

/// Click the first visible, enabled submit control, retrying while the page enables it.
#[instrument(skip_all, fields(site = %site.id))]
pub async fn click_submit(
    page: &dyn PagePort,
    site: &SiteConfig,
    policy: &InjectionPolicy,
) -> SubmitOutcome {
    if site.submit_selectors.is_empty() {
        return SubmitOutcome::NoControl { attempts: 0 };
    }
    let selectors = &site.submit_selectors;
    let outcome = retry(policy.submit_retry(), move |attempt| async move {
        let Some(control) = find_clickable(page, selectors).await else {
            debug!(target: "injector", attempt, "submit control not clickable yet");
            return Err(());
        };
        match page.click(&control.element).await {
            Ok(()) => Ok(control.selector),
            Err(err) => {
                debug!(target: "injector", attempt, error = %err, "submit click failed");
                Err(())
            }
        }
    })
    .await;
    match outcome.result {
        Ok(selector) => SubmitOutcome::Clicked {
            selector,
            attempts: outcome.attempts,
        },
        Err(()) => SubmitOutcome::NoControl {
            attempts: outcome.attempts,
        },
    }
}

/// Click submit, or fall back to a single synthetic Enter keydown on `input`.
///
/// The Enter fallback only counts when the keydown was actually dispatched.
pub async fn submit_or_enter(
    page: &dyn PagePort,
    input: &ElementRef,
    site: &SiteConfig,
    policy: &InjectionPolicy,
) -> Result<SubmissionRecord, InjectError> {
    let attempts = match click_submit(page, site, policy).await {
        SubmitOutcome::Clicked { selector, attempts } => {
            info!(target: "injector", site = %site.id, %selector, attempts, "submitted via click");
            return Ok(SubmissionRecord {
                method: SubmissionMethod::Click,
                selector: Some(selector),
            });
        }
        SubmitOutcome::NoControl { attempts } => attempts,
    };
    match page.dispatch(input, DomEvent::EnterKeyDown).await {
        Ok(()) => {
            info!(target: "injector", site = %site.id, attempts, "no submit control; sent Enter");
            Ok(SubmissionRecord {
                method: SubmissionMethod::EnterKey,
                selector: None,
            })
        }
        Err(PageError::Unreachable(reason)) => Err(InjectError::TabUnavailable(reason)),
        Err(err) => {
            warn!(target: "injector", site = %site.id, error = %err, "enter fallback failed");
            Err(InjectError::SubmissionUncertain(err.to_string()))
        }
    }
}
