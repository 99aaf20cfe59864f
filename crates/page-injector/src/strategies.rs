//! Ordered chain of ways to write text into an input element.
//!
//! Each strategy declares which elements it applies to. The chain tries the applicable ones in
//! order; a strategy succeeds only if reading the element back shows the message took. Failures
//! stay inside the chain and only the last reason is surfaced.

use async_trait::async_trait;
use promptcast_sites::{InjectionMethod, SiteConfig};
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::errors::{InjectError, PageError};
use crate::model::{DomEvent, ElementInfo, ElementKind, ElementRef, StrategyKind};
use crate::policy::InjectionPolicy;
use crate::ports::PagePort;

#[async_trait]
pub trait InjectionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn applies(&self, info: &ElementInfo, site: &SiteConfig) -> bool;

    /// Mutate the element. Focus and settling are handled by the chain.
    async fn write(
        &self,
        page: &dyn PagePort,
        element: &ElementRef,
        message: &str,
    ) -> Result<(), PageError>;
}

/// `<textarea>` and text `<input>`: native value setter, then `input` and `change`.
pub struct FormStrategy;

/// `execCommand('insertText')` for editors that revert direct DOM writes.
pub struct CommandInsertStrategy;

/// One `<p>` per line for ProseMirror, Quill, Lexical and similar editors.
pub struct RichTextStrategy;

/// Last resort for any contenteditable: replace its text content.
pub struct PlainEditableStrategy;

static CHAIN: [&dyn InjectionStrategy; 4] = [
    &FormStrategy,
    &CommandInsertStrategy,
    &RichTextStrategy,
    &PlainEditableStrategy,
];

pub fn chain() -> &'static [&'static dyn InjectionStrategy] {
    &CHAIN
}

#[async_trait]
impl InjectionStrategy for FormStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Form
    }

    fn applies(&self, info: &ElementInfo, _site: &SiteConfig) -> bool {
        matches!(info.kind(), ElementKind::TextArea | ElementKind::TextInput)
    }

    async fn write(
        &self,
        page: &dyn PagePort,
        element: &ElementRef,
        message: &str,
    ) -> Result<(), PageError> {
        page.set_form_value(element, message).await?;
        page.dispatch(element, DomEvent::Input).await?;
        page.dispatch(element, DomEvent::Change).await
    }
}

#[async_trait]
impl InjectionStrategy for CommandInsertStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CommandInsertion
    }

    fn applies(&self, info: &ElementInfo, site: &SiteConfig) -> bool {
        info.content_editable && site.injection_method == InjectionMethod::ExecCommand
    }

    async fn write(
        &self,
        page: &dyn PagePort,
        element: &ElementRef,
        message: &str,
    ) -> Result<(), PageError> {
        if page.exec_insert_text(element, message).await? {
            Ok(())
        } else {
            Err(PageError::Rejected("insertText command returned false".into()))
        }
    }
}

#[async_trait]
impl InjectionStrategy for RichTextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RichText
    }

    fn applies(&self, info: &ElementInfo, _site: &SiteConfig) -> bool {
        info.is_rich_text()
    }

    async fn write(
        &self,
        page: &dyn PagePort,
        element: &ElementRef,
        message: &str,
    ) -> Result<(), PageError> {
        page.set_inner_html(element, &paragraph_markup(message)).await?;
        page.dispatch(element, DomEvent::Input).await
    }
}

#[async_trait]
impl InjectionStrategy for PlainEditableStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PlainEditable
    }

    fn applies(&self, info: &ElementInfo, _site: &SiteConfig) -> bool {
        info.content_editable
    }

    async fn write(
        &self,
        page: &dyn PagePort,
        element: &ElementRef,
        message: &str,
    ) -> Result<(), PageError> {
        page.set_text_content(element, message).await?;
        page.dispatch(element, DomEvent::Input).await
    }
}

/// Write `message` into `element` with the first strategy the page accepts.
#[instrument(skip_all, fields(site = %site.id, tag = %info.tag))]
pub async fn inject(
    page: &dyn PagePort,
    element: &ElementRef,
    info: &ElementInfo,
    message: &str,
    site: &SiteConfig,
    policy: &InjectionPolicy,
) -> Result<StrategyKind, InjectError> {
    let mut last_failure = None;
    for strategy in chain() {
        if !strategy.applies(info, site) {
            continue;
        }
        match attempt(*strategy, page, element, message, policy).await {
            Ok(()) => {
                if site.cursor_to_end && info.content_editable {
                    if let Err(err) = page.place_caret_at_end(element).await {
                        debug!(target: "injector", error = %err, "caret placement failed");
                    }
                }
                debug!(target: "injector", strategy = ?strategy.kind(), "message injected");
                return Ok(strategy.kind());
            }
            Err(reason) => {
                debug!(target: "injector", strategy = ?strategy.kind(), %reason, "strategy failed");
                last_failure = Some(reason);
            }
        }
    }
    Err(match last_failure {
        Some(reason) => InjectError::InjectionFailed(reason),
        None => InjectError::UnsupportedElement(info.tag.to_ascii_lowercase()),
    })
}

async fn attempt(
    strategy: &dyn InjectionStrategy,
    page: &dyn PagePort,
    element: &ElementRef,
    message: &str,
    policy: &InjectionPolicy,
) -> Result<(), String> {
    page.focus(element).await.map_err(|err| err.to_string())?;
    sleep(policy.focus_settle()).await;
    strategy
        .write(page, element, message)
        .await
        .map_err(|err| err.to_string())?;
    sleep(policy.post_inject_settle()).await;
    let current = page.read_text(element).await.map_err(|err| err.to_string())?;
    if accepted(&current, message) {
        Ok(())
    } else {
        Err(format!("{:?} write did not stick", strategy.kind()))
    }
}

/// The element holds the message if it contains the message's first non-blank line.
pub fn accepted(current: &str, message: &str) -> bool {
    let first_line = message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    current.contains(first_line)
}

/// HTML for a rich-text editor: one escaped paragraph per line, `<br>` for blank lines.
pub fn paragraph_markup(message: &str) -> String {
    message
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                "<p><br></p>".to_string()
            } else {
                format!("<p>{}</p>", escape_html(line))
            }
        })
        .collect()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeElement, FakePage};

    fn site() -> SiteConfig {
        SiteConfig::new("demo", "Demo", "https://demo.test/").with_inputs(&["#in"])
    }

    async fn run(page: &FakePage, element: &ElementRef, site: &SiteConfig, message: &str) -> Result<StrategyKind, InjectError> {
        let info = page.inspect(element).await.unwrap();
        inject(page, element, &info, message, site, &InjectionPolicy::default()).await
    }

    #[test]
    fn markup_escapes_and_splits_lines() {
        assert_eq!(
            paragraph_markup("a < b\n\nsay \"hi\" & 'bye'"),
            "<p>a &lt; b</p><p><br></p><p>say &quot;hi&quot; &amp; &#39;bye&#39;</p>"
        );
        assert_eq!(paragraph_markup(""), "");
    }

    #[test]
    fn acceptance_checks_first_non_blank_line() {
        assert!(accepted("hello world\nsecond", "\n  hello world\nsecond"));
        assert!(!accepted("", "hello"));
        assert!(accepted("anything", "   "));
    }

    #[tokio::test(start_paused = true)]
    async fn textarea_uses_form_strategy_with_events() {
        let page = FakePage::new();
        let input = page.add(FakeElement::textarea().matching(&["#in"]));
        assert_eq!(run(&page, &input, &site(), "hi there").await, Ok(StrategyKind::Form));
        assert_eq!(page.value(&input), "hi there");
        assert_eq!(page.events(&input), vec![DomEvent::Input, DomEvent::Change]);
        assert!(page.log().iter().position(|op| op.starts_with("focus"))
            < page.log().iter().position(|op| op.starts_with("set_value")));
    }

    #[tokio::test(start_paused = true)]
    async fn exec_command_site_prefers_command_insertion() {
        let page = FakePage::new();
        let input = page.add(FakeElement::editable().matching(&["#in"]).rich());
        let site = site().with_method(InjectionMethod::ExecCommand);
        assert_eq!(run(&page, &input, &site, "hi").await, Ok(StrategyKind::CommandInsertion));
        assert!(!page.log().iter().any(|op| op.starts_with("set_html")));
    }

    #[tokio::test(start_paused = true)]
    async fn rich_editor_gets_paragraph_markup() {
        let page = FakePage::new();
        let input = page.add(FakeElement::editable().matching(&["#in"]).rich());
        assert_eq!(run(&page, &input, &site(), "one\ntwo").await, Ok(StrategyKind::RichText));
        assert_eq!(page.html(&input), "<p>one</p><p>two</p>");
        assert_eq!(page.events(&input), vec![DomEvent::Input]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_write_falls_through_to_the_next_strategy() {
        let page = FakePage::new();
        let input = page.add(
            FakeElement::editable()
                .matching(&["#in"])
                .rich()
                .rejecting_markup(),
        );
        assert_eq!(run(&page, &input, &site(), "hi").await, Ok(StrategyKind::PlainEditable));
        assert_eq!(page.value(&input), "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn every_strategy_rejected_surfaces_injection_failed() {
        let page = FakePage::new();
        let input = page.add(
            FakeElement::editable()
                .matching(&["#in"])
                .rejecting_direct_writes(),
        );
        let err = run(&page, &input, &site(), "hi").await.unwrap_err();
        assert!(matches!(err, InjectError::InjectionFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_elements_are_reported() {
        let page = FakePage::new();
        let input = page.add(FakeElement::button().matching(&["#in"]));
        let err = run(&page, &input, &site(), "hi").await.unwrap_err();
        assert_eq!(err, InjectError::UnsupportedElement("button".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn caret_moves_to_end_when_requested() {
        let page = FakePage::new();
        let input = page.add(FakeElement::editable().matching(&["#in"]));
        let site = site().with_cursor_to_end(true);
        assert_eq!(run(&page, &input, &site, "hi").await, Ok(StrategyKind::PlainEditable));
        assert_eq!(page.log().last().map(String::as_str), Some("caret_end"));
    }
}
