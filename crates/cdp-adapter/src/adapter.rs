//! Page-level command surface over a [`CdpTransport`].

use crate::commands::{PageInfo, WaitGate};
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::events::RawEvent;
use crate::ids::{BrowserId, PageId, SessionId};
use crate::metrics;
use crate::registry::Registry;
use crate::transport::{
    CdpTransport, ChromiumTransport, CommandTarget, NoopTransport, TransportEvent,
};
use crate::{chrome_mode, resolve_chrome_path, AdapterMode, ChromeMode};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::{select, spawn};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared event bus carrying [`RawEvent`]s to subscribers.
pub type EventBus = broadcast::Sender<RawEvent>;

const READY_POLL: Duration = Duration::from_millis(100);
const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Cdp: Send + Sync {
    /// Open a new tab at `url` and return once a session is attached to it.
    async fn create_page(&self, url: &str) -> Result<PageId, AdapterError>;

    /// Every page target currently known.
    fn pages(&self) -> Vec<PageInfo>;

    async fn activate_page(&self, page: PageId) -> Result<(), AdapterError>;

    async fn wait_basic(
        &self,
        page: PageId,
        gate: WaitGate,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    /// Evaluate `expression` in the page and return its JSON value. Promises are awaited.
    async fn evaluate_script(&self, page: PageId, expression: &str) -> Result<Value, AdapterError>;

    /// Remote object ids for every element matching `selector`, in document order. The handles
    /// belong to `group` until [`Cdp::release_object_group`] is called.
    async fn query_handles(
        &self,
        page: PageId,
        selector: &str,
        group: &str,
    ) -> Result<Vec<String>, AdapterError>;

    /// Call `function` with `this` bound to the remote object and return its JSON value.
    async fn call_function_on(
        &self,
        page: PageId,
        object_id: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, AdapterError>;

    async fn release_object_group(&self, page: PageId, group: &str) -> Result<(), AdapterError>;
}

pub struct CdpAdapter {
    pub browser_id: BrowserId,
    pub cfg: CdpConfig,
    pub bus: EventBus,
    pub registry: Arc<Registry>,
    mode: AdapterMode,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    transport: Arc<dyn CdpTransport>,
    targets: DashMap<String, PageId>,
    sessions: DashMap<String, PageId>,
}

impl CdpAdapter {
    pub fn new(mut cfg: CdpConfig, bus: EventBus) -> Self {
        let mode = chrome_mode();
        let use_real = match mode {
            ChromeMode::ForceStub => false,
            _ if cfg.websocket_url.is_some() => true,
            _ => match resolve_chrome_path(&cfg) {
                Some(path) => {
                    cfg.executable = path;
                    true
                }
                None => {
                    warn!(
                        target: "cdp-adapter",
                        forced = matches!(mode, ChromeMode::ForceReal),
                        "chrome executable not found; falling back to stub transport"
                    );
                    false
                }
            },
        };

        let transport: Arc<dyn CdpTransport> = if use_real {
            info!(target: "cdp-adapter", headless = cfg.headless, "using real Chromium transport");
            Arc::new(ChromiumTransport::new(cfg.clone()))
        } else {
            warn!(
                target: "cdp-adapter",
                mode = %AdapterMode::Stub.as_str(),
                remediation = "install Chrome/Chromium, set PROMPTCAST_CHROME=/path/to/chrome or PROMPTCAST_WS_URL",
                "no browser available; tab commands will fail"
            );
            Arc::new(NoopTransport)
        };
        Self::with_transport(cfg, bus, transport)
    }

    pub fn with_transport(cfg: CdpConfig, bus: EventBus, transport: Arc<dyn CdpTransport>) -> Self {
        let mode = transport.mode();
        Self {
            browser_id: BrowserId::new(),
            cfg,
            bus,
            registry: Arc::new(Registry::new()),
            mode,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            transport,
            targets: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn mode(&self) -> AdapterMode {
        self.mode
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.bus.subscribe()
    }

    /// Connect the transport and start the event loop. Calling it again is a no-op.
    pub async fn start(self: Arc<Self>) -> Result<(), AdapterError> {
        if !self.tasks.lock().await.is_empty() {
            return Ok(());
        }
        self.transport.start().await?;
        let loop_task = spawn(Self::event_loop(Arc::clone(&self)));
        self.tasks.lock().await.push(loop_task);
        info!(target: "cdp-adapter", mode = self.mode.as_str(), "event loop started");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut handles = self.tasks.lock().await;
        while let Some(handle) = handles.pop() {
            let _ = handle.await;
        }
    }

    pub fn register_page(
        &self,
        page: PageId,
        session: SessionId,
        target_id: Option<String>,
        cdp_session: Option<String>,
    ) {
        if let Some(target) = target_id.clone() {
            self.targets.insert(target, page);
        }
        if let Some(cdp_session) = cdp_session.clone() {
            self.sessions.insert(cdp_session, page);
        }
        self.registry
            .insert_page(page, session, target_id, cdp_session);
    }

    async fn event_loop(self: Arc<Self>) {
        debug!(target: "cdp-adapter", "event loop entered");
        const MIN_BACKOFF: Duration = Duration::from_millis(100);
        const MAX_BACKOFF: Duration = Duration::from_secs(5);
        let mut backoff = MIN_BACKOFF;

        loop {
            select! {
                _ = self.shutdown.cancelled() => {
                    break;
                }
                event = self.transport.next_event() => {
                    match event {
                        Some(ev) => {
                            backoff = MIN_BACKOFF;
                            self.handle_event(ev);
                        }
                        None => {
                            if self.shutdown.is_cancelled() {
                                break;
                            }
                            self.handle_transport_disconnect();
                            warn!(target: "cdp-adapter", "transport stream ended; attempting restart");
                            if let Err(err) = self.transport.start().await {
                                warn!(target: "cdp-adapter", ?err, "transport restart failed");
                            }
                            if self.shutdown.is_cancelled() {
                                break;
                            }
                            sleep(backoff).await;
                            backoff = (backoff + MIN_BACKOFF).min(MAX_BACKOFF);
                        }
                    }
                }
            }
        }
        debug!(target: "cdp-adapter", "event loop exiting");
    }

    fn handle_transport_disconnect(&self) {
        let pages: Vec<PageId> = self
            .registry
            .iter()
            .into_iter()
            .map(|(page, _)| page)
            .collect();
        let had_pages = !pages.is_empty();

        for page in pages {
            self.registry.remove_page(&page);
            self.emit_page_event(page, None, "closed", timestamp_now());
        }
        self.targets.clear();
        self.sessions.clear();

        let message = if had_pages {
            "cdp transport restarted; open pages were forgotten"
        } else {
            "cdp transport restarted"
        };
        let _ = self.bus.send(RawEvent::Error {
            page: None,
            message: message.to_string(),
        });
    }

    fn handle_event(&self, event: TransportEvent) {
        if let Err(err) = self.process_event(event) {
            let _ = self.bus.send(RawEvent::Error {
                page: None,
                message: format!("cdp event handling error: {err}"),
            });
        }
    }

    fn process_event(&self, event: TransportEvent) -> Result<(), AdapterError> {
        metrics::record_event();
        match event.method.as_str() {
            "Target.targetCreated" => self.on_target_created(decode(event.params)?),
            "Target.targetDestroyed" => self.on_target_destroyed(decode(event.params)?),
            "Target.attachedToTarget" => self.on_target_attached(decode(event.params)?),
            "Target.detachedFromTarget" => self.on_target_detached(decode(event.params)?),
            "Target.targetInfoChanged" => self.on_target_info_changed(decode(event.params)?),
            "Page.lifecycleEvent" => {
                self.on_page_lifecycle(event.session_id.as_ref(), decode(event.params)?)
            }
            "Runtime.exceptionThrown" => {
                self.on_exception_thrown(event.session_id.as_ref(), decode(event.params)?)
            }
            other => {
                debug!(target: "cdp-adapter", method = %other, "unhandled cdp event");
            }
        }
        Ok(())
    }

    fn on_target_created(&self, payload: TargetCreatedParams) {
        let info = payload.target_info;
        if info.target_type != "page" || self.targets.contains_key(&info.target_id) {
            return;
        }

        let page = PageId::new();
        self.targets.insert(info.target_id.clone(), page);
        self.registry
            .insert_page(page, SessionId::new(), Some(info.target_id), None);
        self.registry.set_target_info(&page, info.url, info.title);
        metrics::record_page_opened();

        let opener = info
            .opener_id
            .and_then(|opener_id| self.targets.get(&opener_id).map(|entry| *entry.value()));
        self.emit_page_event(page, opener, "opened", timestamp_now());
    }

    fn on_target_destroyed(&self, payload: TargetDestroyedParams) {
        if let Some((_, page)) = self.targets.remove(&payload.target_id) {
            self.sessions.retain(|_, v| *v != page);
            self.registry.remove_page(&page);
            self.emit_page_event(page, None, "closed", timestamp_now());
        }
    }

    fn on_target_attached(&self, payload: AttachedToTargetParams) {
        if payload.target_info.target_type != "page" {
            return;
        }
        if let Some(page) = self.page_for_target(&payload.target_info.target_id) {
            self.bind_session(page, payload.session_id);
            self.emit_page_event(page, None, "attached", timestamp_now());
        }
    }

    fn on_target_detached(&self, payload: DetachedFromTargetParams) {
        if let Some((_, page)) = self.sessions.remove(&payload.session_id) {
            debug!(target: "cdp-adapter", ?page, "session detached");
        }
    }

    fn on_target_info_changed(&self, payload: TargetInfoChangedParams) {
        let info = payload.target_info;
        if info.target_type != "page" {
            return;
        }
        let Some(page) = self.page_for_target(&info.target_id) else {
            return;
        };
        let previous = self.registry.get(&page).and_then(|ctx| ctx.recent_url);
        let url = info.url.filter(|u| !u.is_empty());
        self.registry
            .set_target_info(&page, url.clone(), info.title);
        if let Some(url) = url {
            if previous.as_deref() != Some(url.as_str()) {
                let _ = self.bus.send(RawEvent::PageNavigated {
                    page,
                    url,
                    ts: timestamp_now(),
                });
            }
        }
    }

    fn on_page_lifecycle(&self, session: Option<&String>, payload: PageLifecycleParams) {
        if let Some(page) = self.page_from_session(session) {
            let ts = payload
                .timestamp
                .map(|t| (t * 1_000.0) as u64)
                .unwrap_or_else(timestamp_now);
            self.emit_page_event(page, None, &payload.name.to_ascii_lowercase(), ts);
        }
    }

    fn on_exception_thrown(&self, session: Option<&String>, payload: ExceptionThrownParams) {
        let message = payload
            .exception_details
            .exception
            .and_then(|ex| ex.description)
            .or(payload.exception_details.text)
            .unwrap_or_else(|| "runtime exception".to_string());
        let page = self.page_from_session(session);
        let _ = self.bus.send(RawEvent::Error { page, message });
    }

    fn page_for_target(&self, target_id: &str) -> Option<PageId> {
        self.targets.get(target_id).map(|entry| *entry.value())
    }

    fn page_from_session(&self, session: Option<&String>) -> Option<PageId> {
        session.and_then(|sid| self.sessions.get(sid).map(|entry| *entry.value()))
    }

    fn bind_session(&self, page: PageId, session: String) {
        self.sessions.insert(session.clone(), page);
        self.registry.set_cdp_session(&page, session);
    }

    fn emit_page_event(&self, page: PageId, opener: Option<PageId>, phase: &str, ts: u64) {
        let _ = self.bus.send(RawEvent::PageLifecycle {
            page,
            opener,
            phase: phase.to_string(),
            ts,
        });
    }

    fn target_id(&self, page: PageId) -> Result<String, AdapterError> {
        self.registry.target_id(&page).ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no target for page {page:?}"))
        })
    }

    /// Make sure page commands can be sent, attaching to the target if auto-attach missed it.
    async fn ensure_session(&self, page: PageId) -> Result<String, AdapterError> {
        if let Some(session) = self.registry.get_cdp_session(&page) {
            return Ok(session);
        }
        let target_id = self.target_id(page)?;
        let response = self
            .send_command(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session = response
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("attachToTarget missing sessionId")
            })?
            .to_string();
        self.bind_session(page, session.clone());
        Ok(session)
    }

    async fn send_command(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.dispatch_command(CommandTarget::Browser, method, params)
            .await
    }

    async fn send_page_command(
        &self,
        page: PageId,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let session = self.ensure_session(page).await?;
        self.dispatch_command(CommandTarget::Session(session), method, params)
            .await
    }

    async fn dispatch_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let start = Instant::now();
        metrics::record_command(method);
        match self.transport.send_command(target, method, params).await {
            Ok(value) => {
                metrics::record_command_success(method, start.elapsed());
                Ok(value)
            }
            Err(err) => {
                metrics::record_command_failure(method);
                Err(err)
            }
        }
    }

    async fn wait_for_ready_state(
        &self,
        page: PageId,
        gate: WaitGate,
        deadline: Instant,
    ) -> Result<(), AdapterError> {
        loop {
            let response = self
                .send_page_command(
                    page,
                    "Runtime.evaluate",
                    json!({
                        "expression": "document.readyState",
                        "returnByValue": true,
                    }),
                )
                .await?;

            let ready = response
                .get("result")
                .and_then(|v| v.get("value"))
                .and_then(Value::as_str)
                .is_some_and(|state| gate.accepts(state));
            if ready {
                return Ok(());
            }
            if Instant::now() + READY_POLL >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint(format!("page did not reach {gate:?} in time")));
            }
            sleep(READY_POLL).await;
        }
    }
}

fn script_error(context: &str, details: &Value) -> AdapterError {
    let text = details
        .get("exception")
        .and_then(|ex| ex.get("description"))
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("exception");
    AdapterError::new(AdapterErrorKind::ScriptError)
        .with_hint(format!("{context}: {text}"))
        .with_data(details.clone())
}

fn result_value(response: &Value) -> Value {
    response
        .get("result")
        .and_then(|res| res.get("value"))
        .cloned()
        .unwrap_or(Value::Null)
}

#[async_trait]
impl Cdp for CdpAdapter {
    async fn create_page(&self, url: &str) -> Result<PageId, AdapterError> {
        let response = self
            .send_command("Target.createTarget", json!({ "url": url }))
            .await?;
        let target_id = response
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("createTarget missing targetId")
            })?
            .to_string();

        let deadline = Instant::now() + ATTACH_TIMEOUT;
        let page = loop {
            if let Some(page) = self.page_for_target(&target_id) {
                break page;
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("target {target_id} was never announced")));
            }
            sleep(Duration::from_millis(50)).await;
        };
        self.ensure_session(page).await?;
        Ok(page)
    }

    fn pages(&self) -> Vec<PageInfo> {
        self.registry.pages()
    }

    async fn activate_page(&self, page: PageId) -> Result<(), AdapterError> {
        let target_id = self.target_id(page)?;
        self.send_command("Target.activateTarget", json!({ "targetId": target_id }))
            .await?;
        Ok(())
    }

    async fn wait_basic(
        &self,
        page: PageId,
        gate: WaitGate,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.wait_for_ready_state(page, gate, Instant::now() + timeout)
            .await
    }

    async fn evaluate_script(&self, page: PageId, expression: &str) -> Result<Value, AdapterError> {
        let response = self
            .send_page_command(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            return Err(script_error("evaluate", details));
        }
        Ok(result_value(&response))
    }

    async fn query_handles(
        &self,
        page: PageId,
        selector: &str,
        group: &str,
    ) -> Result<Vec<String>, AdapterError> {
        let selector_literal = serde_json::to_string(selector).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
        })?;
        let response = self
            .send_page_command(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": format!("Array.from(document.querySelectorAll({selector_literal}))"),
                    "objectGroup": group,
                    "returnByValue": false,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            return Err(script_error(&format!("querySelectorAll({selector})"), details));
        }
        let Some(array_id) = response
            .get("result")
            .and_then(|res| res.get("objectId"))
            .and_then(Value::as_str)
        else {
            return Ok(Vec::new());
        };

        let properties = self
            .send_page_command(
                page,
                "Runtime.getProperties",
                json!({ "objectId": array_id, "ownProperties": true }),
            )
            .await?;
        let mut indexed: Vec<(usize, String)> = properties
            .get("result")
            .and_then(Value::as_array)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|prop| {
                        let index = prop.get("name")?.as_str()?.parse::<usize>().ok()?;
                        let object_id = prop.get("value")?.get("objectId")?.as_str()?;
                        Some((index, object_id.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, id)| id).collect())
    }

    async fn call_function_on(
        &self,
        page: PageId,
        object_id: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, AdapterError> {
        let arguments: Vec<Value> = args.into_iter().map(|value| json!({ "value": value })).collect();
        let response = self
            .send_page_command(
                page,
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "arguments": arguments,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            return Err(script_error("callFunctionOn", details));
        }
        Ok(result_value(&response))
    }

    async fn release_object_group(&self, page: PageId, group: &str) -> Result<(), AdapterError> {
        self.send_page_command(
            page,
            "Runtime.releaseObjectGroup",
            json!({ "objectGroup": group }),
        )
        .await?;
        Ok(())
    }
}

fn decode<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T, AdapterError> {
    serde_json::from_value(params)
        .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct TargetCreatedParams {
    #[serde(rename = "targetInfo")]
    target_info: TargetInfoPayload,
}

#[derive(Debug, Deserialize)]
struct TargetDestroyedParams {
    #[serde(rename = "targetId")]
    target_id: String,
}

#[derive(Debug, Deserialize)]
struct AttachedToTargetParams {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "targetInfo")]
    target_info: TargetInfoPayload,
}

#[derive(Debug, Deserialize)]
struct DetachedFromTargetParams {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct TargetInfoChangedParams {
    #[serde(rename = "targetInfo")]
    target_info: TargetInfoPayload,
}

#[derive(Debug, Deserialize)]
struct TargetInfoPayload {
    #[serde(rename = "targetId")]
    target_id: String,
    #[serde(rename = "type")]
    target_type: String,
    url: Option<String>,
    title: Option<String>,
    #[serde(rename = "openerId")]
    opener_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageLifecycleParams {
    name: String,
    timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExceptionThrownParams {
    #[serde(rename = "exceptionDetails")]
    exception_details: ExceptionDetails,
}

#[derive(Debug, Deserialize)]
struct ExceptionDetails {
    text: Option<String>,
    exception: Option<ExceptionObject>,
}

#[derive(Debug, Deserialize)]
struct ExceptionObject {
    description: Option<String>,
}

fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
