use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PageError;
use crate::model::{DomEvent, ElementGeometry, ElementInfo, ElementRef, PageDescriptor};

/// Identifier of a mutation watch registered in the page.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(pub String);

impl WatchId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Page-context capabilities the engine is built on.
///
/// Each call is one round trip into a single tab. Element handles stay valid until
/// [`PagePort::release`]; a handle whose node left the document yields
/// [`PageError::StaleElement`].
#[async_trait]
pub trait PagePort: Send + Sync {
    async fn describe_page(&self) -> Result<PageDescriptor, PageError>;

    /// Elements matching `selector` in document order. An invalid selector is an error.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>, PageError>;

    async fn geometry(&self, element: &ElementRef) -> Result<ElementGeometry, PageError>;

    async fn inspect(&self, element: &ElementRef) -> Result<ElementInfo, PageError>;

    async fn focus(&self, element: &ElementRef) -> Result<(), PageError>;

    /// Assign `value` through the native value setter of the element's prototype so framework
    /// wrappers observe the change.
    async fn set_form_value(&self, element: &ElementRef, value: &str) -> Result<(), PageError>;

    /// Select the element's content and replace it with `insertText`. Returns the command's
    /// own success flag.
    async fn exec_insert_text(&self, element: &ElementRef, text: &str) -> Result<bool, PageError>;

    async fn set_inner_html(&self, element: &ElementRef, html: &str) -> Result<(), PageError>;

    async fn set_text_content(&self, element: &ElementRef, text: &str) -> Result<(), PageError>;

    /// Current text of the element: `value` for form controls, rendered text otherwise.
    async fn read_text(&self, element: &ElementRef) -> Result<String, PageError>;

    async fn place_caret_at_end(&self, element: &ElementRef) -> Result<(), PageError>;

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> Result<(), PageError>;

    async fn click(&self, element: &ElementRef) -> Result<(), PageError>;

    /// Resolve `true` once a node matching any selector is added to the document, `false`
    /// when `timeout` elapses first. The watch is torn down when this returns or when
    /// [`PagePort::cancel_watch`] is called with the same id.
    async fn watch_for_added(
        &self,
        watch: &WatchId,
        selectors: &[String],
        timeout: Duration,
    ) -> Result<bool, PageError>;

    async fn cancel_watch(&self, watch: &WatchId) -> Result<(), PageError>;

    /// Drop every element handle handed out so far.
    async fn release(&self) -> Result<(), PageError> {
        Ok(())
    }
}
