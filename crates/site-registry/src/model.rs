use promptcast_core_types::SiteId;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::SiteError;

/// How contenteditable inputs on a site must be written.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMethod {
    /// Pick the strategy from the element's own capabilities.
    #[default]
    Default,
    /// The editor reverts direct DOM writes; use `execCommand('insertText')`.
    ExecCommand,
}

/// Static description of one chat site.
///
/// Selector lists are ordered by priority: the most site-specific selector first, generic
/// fallbacks last. The first visible match wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: SiteId,
    pub name: String,
    pub url: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub input_selectors: Vec<String>,
    #[serde(default)]
    pub submit_selectors: Vec<String>,
    #[serde(default)]
    pub stop_selectors: Vec<String>,
    #[serde(default)]
    pub injection_method: InjectionMethod,
    /// Move the caret to the end of the editor after inserting.
    #[serde(default)]
    pub cursor_to_end: bool,
}

fn default_color() -> String {
    "#6b7280".to_string()
}

fn default_enabled() -> bool {
    true
}

impl SiteConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: SiteId::new(id),
            name: name.into(),
            url: url.into(),
            color: default_color(),
            enabled: true,
            input_selectors: Vec::new(),
            submit_selectors: Vec::new(),
            stop_selectors: Vec::new(),
            injection_method: InjectionMethod::Default,
            cursor_to_end: false,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_inputs(mut self, selectors: &[&str]) -> Self {
        self.input_selectors = to_owned(selectors);
        self
    }

    pub fn with_submits(mut self, selectors: &[&str]) -> Self {
        self.submit_selectors = to_owned(selectors);
        self
    }

    pub fn with_stops(mut self, selectors: &[&str]) -> Self {
        self.stop_selectors = to_owned(selectors);
        self
    }

    pub fn with_method(mut self, method: InjectionMethod) -> Self {
        self.injection_method = method;
        self
    }

    pub fn with_cursor_to_end(mut self, flag: bool) -> Self {
        self.cursor_to_end = flag;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Host used for tab matching, without a leading `www.`.
    pub fn host(&self) -> Result<String, SiteError> {
        normalized_host(&self.url).ok_or_else(|| SiteError::InvalidUrl {
            id: self.id.clone(),
            url: self.url.clone(),
        })
    }

    /// True when `candidate` points at this site (same host, ignoring `www.`).
    pub fn matches_url(&self, candidate: &str) -> bool {
        match (self.host(), normalized_host(candidate)) {
            (Ok(own), Some(other)) => own == other,
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<(), SiteError> {
        self.host()?;
        if self.enabled && self.input_selectors.is_empty() {
            return Err(SiteError::NoInputSelectors(self.id.clone()));
        }
        Ok(())
    }
}

fn to_owned(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| s.to_string()).collect()
}

fn normalized_host(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}
