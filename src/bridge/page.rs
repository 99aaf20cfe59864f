use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{Cdp, PageId};
use page_injector::{
    DomEvent, ElementGeometry, ElementInfo, ElementRef, PageDescriptor, PageError, PagePort,
    WatchId,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::page_error;
use crate::scripts;

/// One tab's page context, reached through `Runtime` calls on the adapter.
///
/// Element handles are remote object ids grouped under a per-instance object group, so
/// [`PagePort::release`] frees them all at once.
pub struct CdpPage {
    cdp: Arc<dyn Cdp>,
    page: PageId,
    group: String,
}

impl CdpPage {
    pub fn new(cdp: Arc<dyn Cdp>, page: PageId) -> Self {
        Self {
            cdp,
            page,
            group: format!("promptcast-{}", uuid::Uuid::new_v4()),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page
    }

    pub fn object_group(&self) -> &str {
        &self.group
    }

    async fn call(
        &self,
        element: &ElementRef,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, PageError> {
        self.cdp
            .call_function_on(self.page, &element.0, function, args)
            .await
            .map_err(page_error)
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        element: &ElementRef,
        function: &str,
    ) -> Result<T, PageError> {
        let value = self.call(element, function, Vec::new()).await?;
        decode(value)
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        self.cdp
            .evaluate_script(self.page, expression)
            .await
            .map_err(page_error)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, PageError> {
    serde_json::from_value(value).map_err(|err| PageError::Script(format!("unexpected result: {err}")))
}

fn encode_error(err: serde_json::Error) -> PageError {
    PageError::Script(format!("could not encode script: {err}"))
}

#[async_trait]
impl PagePort for CdpPage {
    async fn describe_page(&self) -> Result<PageDescriptor, PageError> {
        decode(self.evaluate(scripts::DESCRIBE_PAGE).await?)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>, PageError> {
        let handles = self
            .cdp
            .query_handles(self.page, selector, &self.group)
            .await
            .map_err(page_error)?;
        Ok(handles.into_iter().map(ElementRef::new).collect())
    }

    async fn geometry(&self, element: &ElementRef) -> Result<ElementGeometry, PageError> {
        self.call_as(element, scripts::GEOMETRY).await
    }

    async fn inspect(&self, element: &ElementRef) -> Result<ElementInfo, PageError> {
        self.call_as(element, scripts::INSPECT).await
    }

    async fn focus(&self, element: &ElementRef) -> Result<(), PageError> {
        self.call(element, scripts::FOCUS, Vec::new()).await.map(|_| ())
    }

    async fn set_form_value(&self, element: &ElementRef, value: &str) -> Result<(), PageError> {
        self.call(element, scripts::SET_FORM_VALUE, scripts::string_arg(value))
            .await
            .map(|_| ())
    }

    async fn exec_insert_text(&self, element: &ElementRef, text: &str) -> Result<bool, PageError> {
        let value = self
            .call(element, scripts::EXEC_INSERT_TEXT, scripts::string_arg(text))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn set_inner_html(&self, element: &ElementRef, html: &str) -> Result<(), PageError> {
        self.call(element, scripts::SET_INNER_HTML, scripts::string_arg(html))
            .await
            .map(|_| ())
    }

    async fn set_text_content(&self, element: &ElementRef, text: &str) -> Result<(), PageError> {
        self.call(element, scripts::SET_TEXT_CONTENT, scripts::string_arg(text))
            .await
            .map(|_| ())
    }

    async fn read_text(&self, element: &ElementRef) -> Result<String, PageError> {
        let value = self.call(element, scripts::READ_TEXT, Vec::new()).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn place_caret_at_end(&self, element: &ElementRef) -> Result<(), PageError> {
        self.call(element, scripts::PLACE_CARET_AT_END, Vec::new())
            .await
            .map(|_| ())
    }

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> Result<(), PageError> {
        let kind = serde_json::to_value(event).map_err(encode_error)?;
        self.call(element, scripts::DISPATCH_EVENT, vec![kind])
            .await
            .map(|_| ())
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        self.call(element, scripts::CLICK, Vec::new()).await.map(|_| ())
    }

    async fn watch_for_added(
        &self,
        watch: &WatchId,
        selectors: &[String],
        timeout: Duration,
    ) -> Result<bool, PageError> {
        let expression = scripts::watch_expression(&watch.0, selectors, timeout.as_millis() as u64)
            .map_err(encode_error)?;
        let found = self.evaluate(&expression).await?;
        Ok(found.as_bool().unwrap_or(false))
    }

    async fn cancel_watch(&self, watch: &WatchId) -> Result<(), PageError> {
        let expression = scripts::cancel_watch_expression(&watch.0).map_err(encode_error)?;
        self.evaluate(&expression).await.map(|_| ())
    }

    async fn release(&self) -> Result<(), PageError> {
        debug!(target: "bridge", group = %self.group, "releasing element handles");
        self.cdp
            .release_object_group(self.page, &self.group)
            .await
            .map_err(page_error)
    }
}
