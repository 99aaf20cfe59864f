use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle to an element living in the page (a remote object id over CDP).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }
}

/// Layout facts needed by the visibility predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementGeometry {
    pub width: f64,
    pub height: f64,
    pub display: String,
    pub visibility: String,
}

const TEXT_INPUT_TYPES: &[&str] = &["", "text", "search", "email", "url", "tel"];
const RICH_TEXT_CLASSES: &[&str] = &["ProseMirror", "ql-editor", "tiptap", "DraftEditor-root"];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    TextArea,
    TextInput,
    ContentEditable,
    Other,
}

/// Static facts about an element, gathered in one page round trip.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub content_editable: bool,
    /// Editor marker attributes present on the element (`data-lexical-editor`, ...).
    #[serde(default)]
    pub editor_attributes: Vec<String>,
    /// A descendant carries a known rich-text editor marker.
    #[serde(default)]
    pub has_rich_wrapper: bool,
    /// `disabled` attribute or `aria-disabled="true"`.
    #[serde(default)]
    pub disabled: bool,
}

impl ElementInfo {
    pub fn kind(&self) -> ElementKind {
        match self.tag.to_ascii_lowercase().as_str() {
            "textarea" => ElementKind::TextArea,
            "input" => {
                let ty = self
                    .input_type
                    .as_deref()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if TEXT_INPUT_TYPES.contains(&ty.as_str()) {
                    ElementKind::TextInput
                } else {
                    ElementKind::Other
                }
            }
            _ if self.content_editable => ElementKind::ContentEditable,
            _ => ElementKind::Other,
        }
    }

    pub fn is_rich_text(&self) -> bool {
        self.content_editable
            && (self.has_rich_wrapper
                || !self.editor_attributes.is_empty()
                || self
                    .classes
                    .iter()
                    .any(|class| RICH_TEXT_CLASSES.contains(&class.as_str())))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub title: String,
    pub url: String,
    pub ready_state: String,
}

impl PageDescriptor {
    pub fn unknown() -> Self {
        Self {
            title: "Unknown".to_string(),
            url: "Unknown".to_string(),
            ready_state: "unknown".to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.ready_state == "complete"
    }
}

/// Synthetic events the engine dispatches. All of them bubble.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomEvent {
    Input,
    Change,
    EnterKeyDown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Form,
    CommandInsertion,
    RichText,
    PlainEditable,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMethod {
    Click,
    /// Synthetic Enter on the input; cannot be verified.
    EnterKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub selector: String,
    pub kind: ElementKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingInfo {
    pub started_at: DateTime<Utc>,
    pub method: Option<StrategyKind>,
    /// Time spent before the input element was located.
    pub wait_ms: u64,
    pub total_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionDetails {
    pub element: Option<ElementDescriptor>,
    pub timing: TimingInfo,
    pub page: PageDescriptor,
    pub attempt: u32,
    pub submitted: bool,
    pub submission: Option<SubmissionMethod>,
    pub submit_selector: Option<String>,
    pub stop_triggered: bool,
}

impl InjectionDetails {
    pub fn new(started_at: DateTime<Utc>, page: PageDescriptor, attempt: u32) -> Self {
        Self {
            element: None,
            timing: TimingInfo {
                started_at,
                method: None,
                wait_ms: 0,
                total_ms: 0,
            },
            page,
            attempt,
            submitted: false,
            submission: None,
            submit_selector: None,
            stop_triggered: false,
        }
    }
}

/// Outcome of one injection attempt in one tab. Built once, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionResult {
    pub success: bool,
    pub error: Option<String>,
    pub details: InjectionDetails,
}

impl InjectionResult {
    pub fn succeeded(details: InjectionDetails) -> Self {
        Self {
            success: true,
            error: None,
            details,
        }
    }

    pub fn failed(error: impl Into<String>, details: InjectionDetails) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            details,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessDetails {
    pub page: PageDescriptor,
    pub input_found: bool,
    pub selector: Option<String>,
}

/// Pre-flight observation; no side effects on the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessResult {
    pub ready: bool,
    pub reason: Option<String>,
    pub details: Option<ReadinessDetails>,
}

impl ReadinessResult {
    pub fn ready(details: ReadinessDetails) -> Self {
        Self {
            ready: true,
            reason: None,
            details: Some(details),
        }
    }

    pub fn not_ready(reason: impl Into<String>, details: Option<ReadinessDetails>) -> Self {
        Self {
            ready: false,
            reason: Some(reason.into()),
            details,
        }
    }
}
