use tracing::{debug, trace};

use crate::model::ElementRef;
use crate::ports::PagePort;
use crate::visibility::element_is_visible;

/// An element found by walking a selector list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedElement {
    pub element: ElementRef,
    pub selector: String,
    /// Position of `selector` in the list it came from.
    pub rank: usize,
}

/// First visible element for the highest-priority selector that has one.
///
/// Selectors are tried in order and, within a selector, elements in document order. A
/// selector the page refuses to evaluate is skipped.
pub async fn find_first_visible(page: &dyn PagePort, selectors: &[String]) -> Option<LocatedElement> {
    find_matching(page, selectors, false).await
}

/// Like [`find_first_visible`] but also skips elements that are disabled.
pub async fn find_clickable(page: &dyn PagePort, selectors: &[String]) -> Option<LocatedElement> {
    find_matching(page, selectors, true).await
}

async fn find_matching(
    page: &dyn PagePort,
    selectors: &[String],
    require_enabled: bool,
) -> Option<LocatedElement> {
    for (rank, selector) in selectors.iter().enumerate() {
        let candidates = match page.query_all(selector).await {
            Ok(candidates) => candidates,
            Err(err) => {
                debug!(target: "injector", %selector, error = %err, "selector skipped");
                continue;
            }
        };
        for element in candidates {
            if !element_is_visible(page, &element).await {
                continue;
            }
            if require_enabled && !is_enabled(page, &element).await {
                trace!(target: "injector", %selector, "skipping disabled control");
                continue;
            }
            return Some(LocatedElement {
                element,
                selector: selector.clone(),
                rank,
            });
        }
    }
    None
}

async fn is_enabled(page: &dyn PagePort, element: &ElementRef) -> bool {
    page.inspect(element)
        .await
        .map(|info| !info.disabled)
        .unwrap_or(false)
}
