use tracing::trace;

use crate::model::{ElementGeometry, ElementRef};
use crate::ports::PagePort;

/// Rendered with a non-zero box and not hidden by `display` or `visibility`.
pub fn is_visible(geometry: &ElementGeometry) -> bool {
    geometry.width > 0.0
        && geometry.height > 0.0
        && geometry.display != "none"
        && geometry.visibility != "hidden"
}

/// Visibility of a live element. Anything that prevents measuring it counts as not visible.
pub async fn element_is_visible(page: &dyn PagePort, element: &ElementRef) -> bool {
    match page.geometry(element).await {
        Ok(geometry) => is_visible(&geometry),
        Err(err) => {
            trace!(target: "injector", handle = %element.0, error = %err, "geometry unavailable");
            false
        }
    }
}
