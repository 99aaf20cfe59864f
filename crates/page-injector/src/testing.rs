//! In-memory page used by tests across the workspace.
//!
//! Elements carry their own timeline (appear, enable, disappear) measured from the moment the
//! page was created, so tests driven by a paused tokio clock stay deterministic.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};

use crate::errors::PageError;
use crate::model::{DomEvent, ElementGeometry, ElementInfo, ElementRef, PageDescriptor};
use crate::ports::{PagePort, WatchId};

const WATCH_TICK: Duration = Duration::from_millis(25);

#[derive(Clone, Debug)]
pub struct FakeElement {
    matches: Vec<String>,
    info: ElementInfo,
    geometry: ElementGeometry,
    appears_after: Option<Duration>,
    enabled_after: Option<Duration>,
    removed_after_click: Option<Duration>,
    rejects_markup: bool,
    rejects_direct_writes: bool,
    rejects_enter: bool,
}

impl FakeElement {
    fn with_tag(tag: &str) -> Self {
        Self {
            matches: vec![tag.to_string()],
            info: ElementInfo {
                tag: tag.to_string(),
                ..ElementInfo::default()
            },
            geometry: ElementGeometry {
                width: 320.0,
                height: 48.0,
                display: "block".into(),
                visibility: "visible".into(),
            },
            appears_after: None,
            enabled_after: None,
            removed_after_click: None,
            rejects_markup: false,
            rejects_direct_writes: false,
            rejects_enter: false,
        }
    }

    pub fn textarea() -> Self {
        Self::with_tag("textarea")
    }

    pub fn input(input_type: &str) -> Self {
        let mut element = Self::with_tag("input");
        element.info.input_type = Some(input_type.to_string());
        element
    }

    pub fn editable() -> Self {
        let mut element = Self::with_tag("div");
        element.info.content_editable = true;
        element
    }

    pub fn button() -> Self {
        Self::with_tag("button")
    }

    /// Selectors this element answers to, replacing the default tag selector.
    pub fn matching(mut self, selectors: &[&str]) -> Self {
        self.matches = selectors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.info.id = Some(id.to_string());
        self
    }

    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.info.classes = classes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Marks the element as a ProseMirror editor.
    pub fn rich(mut self) -> Self {
        self.info.classes.push("ProseMirror".into());
        self
    }

    /// Zero-sized box.
    pub fn hidden(mut self) -> Self {
        self.geometry.width = 0.0;
        self.geometry.height = 0.0;
        self
    }

    pub fn display_none(mut self) -> Self {
        self.geometry.display = "none".into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.info.disabled = true;
        self
    }

    /// A disabled element becomes enabled once `delay` has passed.
    pub fn enabled_after(mut self, delay: Duration) -> Self {
        self.enabled_after = Some(delay);
        self
    }

    /// Added to the document only after `delay`.
    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = Some(delay);
        self
    }

    /// Leaves the document `delay` after its first click.
    pub fn removed_after_click(mut self, delay: Duration) -> Self {
        self.removed_after_click = Some(delay);
        self
    }

    /// `innerHTML` writes are silently reverted.
    pub fn rejecting_markup(mut self) -> Self {
        self.rejects_markup = true;
        self
    }

    /// Every direct write (`value`, `innerHTML`, `textContent`) is silently reverted.
    pub fn rejecting_direct_writes(mut self) -> Self {
        self.rejects_direct_writes = true;
        self.rejects_markup = true;
        self
    }

    /// Synthetic Enter keydowns throw inside the page.
    pub fn rejecting_enter(mut self) -> Self {
        self.rejects_enter = true;
        self
    }
}

struct ElementState {
    handle: ElementRef,
    spec: FakeElement,
    text: String,
    html: String,
    events: Vec<DomEvent>,
    clicks: u32,
    first_click: Option<Instant>,
}

struct PageState {
    title: String,
    url: String,
    ready_state: String,
    unreachable: bool,
    released: bool,
    elements: Vec<ElementState>,
    rejected_selectors: HashSet<String>,
    queries: HashMap<String, usize>,
    active_watches: HashSet<WatchId>,
    watches_started: usize,
    enter_count: u32,
    log: Vec<String>,
}

pub struct FakePage {
    created: Instant,
    state: Mutex<PageState>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            state: Mutex::new(PageState {
                title: "Fake page".into(),
                url: "https://fake.test/".into(),
                ready_state: "complete".into(),
                unreachable: false,
                released: false,
                elements: Vec::new(),
                rejected_selectors: HashSet::new(),
                queries: HashMap::new(),
                active_watches: HashSet::new(),
                watches_started: 0,
                enter_count: 0,
                log: Vec::new(),
            }),
        }
    }

    pub fn with_title(self, title: &str) -> Self {
        self.state.lock().title = title.to_string();
        self
    }

    pub fn with_url(self, url: &str) -> Self {
        self.state.lock().url = url.to_string();
        self
    }

    pub fn with_ready_state(self, ready_state: &str) -> Self {
        self.state.lock().ready_state = ready_state.to_string();
        self
    }

    pub fn add(&self, spec: FakeElement) -> ElementRef {
        let mut state = self.state.lock();
        let handle = ElementRef::new(format!("el-{}", state.elements.len() + 1));
        state.elements.push(ElementState {
            handle: handle.clone(),
            spec,
            text: String::new(),
            html: String::new(),
            events: Vec::new(),
            clicks: 0,
            first_click: None,
        });
        handle
    }

    /// Make `selector` fail to parse, like a malformed CSS selector would.
    pub fn reject_selector(&self, selector: &str) {
        self.state.lock().rejected_selectors.insert(selector.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Register a watch id as live without going through `watch_for_added`.
    pub fn arm_watch(&self, watch: &WatchId) {
        self.state.lock().active_watches.insert(watch.clone());
    }

    pub fn query_count(&self, selector: &str) -> usize {
        self.state.lock().queries.get(selector).copied().unwrap_or(0)
    }

    pub fn active_watches(&self) -> Vec<WatchId> {
        self.state.lock().active_watches.iter().cloned().collect()
    }

    pub fn watch_count(&self) -> usize {
        self.state.lock().watches_started
    }

    pub fn clicks(&self, element: &ElementRef) -> u32 {
        self.with_element(element, |el| el.clicks).unwrap_or(0)
    }

    pub fn value(&self, element: &ElementRef) -> String {
        self.with_element(element, |el| el.text.clone()).unwrap_or_default()
    }

    pub fn html(&self, element: &ElementRef) -> String {
        self.with_element(element, |el| el.html.clone()).unwrap_or_default()
    }

    pub fn events(&self, element: &ElementRef) -> Vec<DomEvent> {
        self.with_element(element, |el| el.events.clone()).unwrap_or_default()
    }

    pub fn enter_count(&self) -> u32 {
        self.state.lock().enter_count
    }

    /// Mutating operations in call order, e.g. `focus:el-1`, `click:el-2`, `caret_end`.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn released(&self) -> bool {
        self.state.lock().released
    }

    fn with_element<T>(&self, element: &ElementRef, f: impl FnOnce(&ElementState) -> T) -> Option<T> {
        let state = self.state.lock();
        state.elements.iter().find(|el| &el.handle == element).map(f)
    }

    fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.created)
    }

    fn is_present(&self, el: &ElementState) -> bool {
        let now = self.elapsed();
        if el.spec.appears_after.is_some_and(|delay| now < delay) {
            return false;
        }
        match (el.first_click, el.spec.removed_after_click) {
            (Some(clicked), Some(delay)) => Instant::now().duration_since(clicked) < delay,
            _ => true,
        }
    }

    fn is_disabled(&self, el: &ElementState) -> bool {
        el.spec.info.disabled
            && el
                .spec
                .enabled_after
                .map_or(true, |delay| self.elapsed() < delay)
    }

    /// Run `f` on a live element, logging `op` when given.
    fn mutate<T>(
        &self,
        element: &ElementRef,
        op: Option<&str>,
        f: impl FnOnce(&mut ElementState, &mut u32) -> Result<T, PageError>,
    ) -> Result<T, PageError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.unreachable {
            return Err(PageError::Unreachable("tab closed".into()));
        }
        let index = state
            .elements
            .iter()
            .position(|el| &el.handle == element)
            .ok_or(PageError::StaleElement)?;
        if !self.is_present(&state.elements[index]) {
            return Err(PageError::StaleElement);
        }
        if let Some(op) = op {
            state.log.push(op.to_string());
        }
        f(&mut state.elements[index], &mut state.enter_count)
    }
}

fn markup_to_text(html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    let normalized = html.replace("</p>", "</p>\n");
    for ch in normalized.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            other if !in_tag => text.push(other),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim_end()
        .to_string()
}

#[async_trait]
impl PagePort for FakePage {
    async fn describe_page(&self) -> Result<PageDescriptor, PageError> {
        let state = self.state.lock();
        if state.unreachable {
            return Err(PageError::Unreachable("tab closed".into()));
        }
        Ok(PageDescriptor {
            title: state.title.clone(),
            url: state.url.clone(),
            ready_state: state.ready_state.clone(),
        })
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>, PageError> {
        let mut state = self.state.lock();
        *state.queries.entry(selector.to_string()).or_insert(0) += 1;
        if state.unreachable {
            return Err(PageError::Unreachable("tab closed".into()));
        }
        if state.rejected_selectors.contains(selector) {
            return Err(PageError::Script(format!("'{selector}' is not a valid selector")));
        }
        Ok(state
            .elements
            .iter()
            .filter(|el| el.spec.matches.iter().any(|m| m == selector))
            .filter(|el| self.is_present(el))
            .map(|el| el.handle.clone())
            .collect())
    }

    async fn geometry(&self, element: &ElementRef) -> Result<ElementGeometry, PageError> {
        self.mutate(element, None, |el, _| Ok(el.spec.geometry.clone()))
    }

    async fn inspect(&self, element: &ElementRef) -> Result<ElementInfo, PageError> {
        let disabled = self
            .with_element(element, |el| self.is_disabled(el))
            .unwrap_or(false);
        self.mutate(element, None, |el, _| {
            let mut info = el.spec.info.clone();
            info.disabled = disabled;
            Ok(info)
        })
    }

    async fn focus(&self, element: &ElementRef) -> Result<(), PageError> {
        let op = format!("focus:{}", element.0);
        self.mutate(element, Some(&op), |_, _| Ok(()))
    }

    async fn set_form_value(&self, element: &ElementRef, value: &str) -> Result<(), PageError> {
        let op = format!("set_value:{}", element.0);
        self.mutate(element, Some(&op), |el, _| {
            if !matches!(el.spec.info.tag.as_str(), "textarea" | "input") {
                return Err(PageError::Script("no native value setter".into()));
            }
            if !el.spec.rejects_direct_writes {
                el.text = value.to_string();
            }
            Ok(())
        })
    }

    async fn exec_insert_text(&self, element: &ElementRef, text: &str) -> Result<bool, PageError> {
        let op = format!("exec_insert:{}", element.0);
        self.mutate(element, Some(&op), |el, _| {
            el.text = text.to_string();
            Ok(true)
        })
    }

    async fn set_inner_html(&self, element: &ElementRef, html: &str) -> Result<(), PageError> {
        let op = format!("set_html:{}", element.0);
        self.mutate(element, Some(&op), |el, _| {
            if !el.spec.rejects_markup {
                el.html = html.to_string();
                el.text = markup_to_text(html);
            }
            Ok(())
        })
    }

    async fn set_text_content(&self, element: &ElementRef, text: &str) -> Result<(), PageError> {
        let op = format!("set_text:{}", element.0);
        self.mutate(element, Some(&op), |el, _| {
            if !el.spec.rejects_direct_writes {
                el.text = text.to_string();
            }
            Ok(())
        })
    }

    async fn read_text(&self, element: &ElementRef) -> Result<String, PageError> {
        self.mutate(element, None, |el, _| Ok(el.text.clone()))
    }

    async fn place_caret_at_end(&self, element: &ElementRef) -> Result<(), PageError> {
        self.mutate(element, Some("caret_end"), |_, _| Ok(()))
    }

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> Result<(), PageError> {
        let op = format!("dispatch:{event:?}:{}", element.0);
        self.mutate(element, Some(&op), |el, enter_count| {
            if event == DomEvent::EnterKeyDown && el.spec.rejects_enter {
                return Err(PageError::Rejected("keydown listener threw".into()));
            }
            el.events.push(event);
            if event == DomEvent::EnterKeyDown {
                *enter_count += 1;
            }
            Ok(())
        })
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        let op = format!("click:{}", element.0);
        self.mutate(element, Some(&op), |el, _| {
            el.clicks += 1;
            el.first_click.get_or_insert_with(Instant::now);
            Ok(())
        })
    }

    async fn watch_for_added(
        &self,
        watch: &WatchId,
        selectors: &[String],
        timeout: Duration,
    ) -> Result<bool, PageError> {
        {
            let mut state = self.state.lock();
            if state.unreachable {
                return Err(PageError::Unreachable("tab closed".into()));
            }
            state.active_watches.insert(watch.clone());
            state.watches_started += 1;
        }
        let started = Instant::now();
        loop {
            {
                let mut state = self.state.lock();
                if !state.active_watches.contains(watch) {
                    return Ok(false);
                }
                let added = state.elements.iter().any(|el| {
                    el.spec.appears_after.is_some()
                        && self.is_present(el)
                        && el.spec.matches.iter().any(|m| selectors.contains(m))
                });
                let waited = started.elapsed();
                if added || waited >= timeout {
                    state.active_watches.remove(watch);
                    return Ok(added);
                }
            }
            let remaining = timeout.saturating_sub(started.elapsed());
            sleep(WATCH_TICK.min(remaining)).await;
        }
    }

    async fn cancel_watch(&self, watch: &WatchId) -> Result<(), PageError> {
        self.state.lock().active_watches.remove(watch);
        Ok(())
    }

    async fn release(&self) -> Result<(), PageError> {
        self.state.lock().released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_round_trips_to_text() {
        assert_eq!(markup_to_text("<p>a &lt; b</p><p><br></p><p>c</p>"), "a < b\n\nc");
    }

    #[tokio::test(start_paused = true)]
    async fn elements_follow_their_timeline() {
        let page = FakePage::new();
        let late = page.add(FakeElement::textarea().appears_after(Duration::from_millis(100)));
        assert!(page.query_all("textarea").await.unwrap().is_empty());
        sleep(Duration::from_millis(100)).await;
        assert_eq!(page.query_all("textarea").await.unwrap(), vec![late.clone()]);

        let button = page.add(
            FakeElement::button()
                .disabled()
                .enabled_after(Duration::from_millis(300))
                .removed_after_click(Duration::from_millis(50)),
        );
        assert!(page.inspect(&button).await.unwrap().disabled);
        sleep(Duration::from_millis(200)).await;
        assert!(!page.inspect(&button).await.unwrap().disabled);
        page.click(&button).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(page.click(&button).await, Err(PageError::StaleElement));
    }
}
