//! JavaScript run inside chat pages.
//!
//! Element functions are `Runtime.callFunctionOn` declarations: `this` is the element and
//! arguments arrive by value. Every function returns something JSON serializable.

use serde_json::Value;

pub const DESCRIBE_PAGE: &str =
    "({ title: document.title, url: location.href, ready_state: document.readyState })";

pub const GEOMETRY: &str = r#"function() {
  const rect = this.getBoundingClientRect();
  const style = window.getComputedStyle(this);
  return {
    width: rect.width,
    height: rect.height,
    display: style.display,
    visibility: style.visibility,
  };
}"#;

pub const INSPECT: &str = r#"function() {
  const markers = ['data-lexical-editor', 'data-slate-editor', 'data-contents'];
  const wrappers = '.ProseMirror, .ql-editor, .tiptap, [data-lexical-editor], [data-slate-editor]';
  const tag = this.tagName.toLowerCase();
  return {
    tag,
    input_type: tag === 'input' ? (this.getAttribute('type') || 'text') : null,
    id: this.id || null,
    classes: Array.from(this.classList),
    content_editable: this.isContentEditable === true,
    editor_attributes: markers.filter((name) => this.hasAttribute(name)),
    has_rich_wrapper: this.querySelector(wrappers) !== null,
    disabled: this.disabled === true || this.getAttribute('aria-disabled') === 'true',
  };
}"#;

pub const FOCUS: &str = r#"function() {
  this.focus();
  return document.activeElement === this;
}"#;

pub const SET_FORM_VALUE: &str = r#"function(value) {
  const proto = this instanceof HTMLTextAreaElement
    ? HTMLTextAreaElement.prototype
    : HTMLInputElement.prototype;
  const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
  if (descriptor && descriptor.set) {
    descriptor.set.call(this, value);
  } else {
    this.value = value;
  }
  return true;
}"#;

pub const EXEC_INSERT_TEXT: &str = r#"function(text) {
  this.focus();
  const range = document.createRange();
  range.selectNodeContents(this);
  const selection = window.getSelection();
  selection.removeAllRanges();
  selection.addRange(range);
  return document.execCommand('insertText', false, text) === true;
}"#;

pub const SET_INNER_HTML: &str = r#"function(html) {
  this.innerHTML = html;
  return true;
}"#;

pub const SET_TEXT_CONTENT: &str = r#"function(text) {
  this.textContent = text;
  return true;
}"#;

pub const READ_TEXT: &str = r#"function() {
  if (typeof this.value === 'string' && (this.tagName === 'TEXTAREA' || this.tagName === 'INPUT')) {
    return this.value;
  }
  return this.innerText ?? this.textContent ?? '';
}"#;

pub const PLACE_CARET_AT_END: &str = r#"function() {
  const range = document.createRange();
  range.selectNodeContents(this);
  range.collapse(false);
  const selection = window.getSelection();
  selection.removeAllRanges();
  selection.addRange(range);
  return true;
}"#;

/// Takes the snake_case name of a `DomEvent`.
pub const DISPATCH_EVENT: &str = r#"function(kind) {
  const event = kind === 'enter_key_down'
    ? new KeyboardEvent('keydown', {
        key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true,
      })
    : new Event(kind, { bubbles: true });
  this.dispatchEvent(event);
  return true;
}"#;

pub const CLICK: &str = r#"function() {
  this.click();
  return true;
}"#;

/// Expression resolving to `true` when a node matching one of `selectors` is added, `false`
/// after `timeout_ms`. The observer registers a cancel hook under `id`.
pub fn watch_expression(id: &str, selectors: &[String], timeout_ms: u64) -> Result<String, serde_json::Error> {
    let id = serde_json::to_string(id)?;
    let selectors = serde_json::to_string(selectors)?;
    Ok(format!(
        r#"(() => {{
  const id = {id};
  const selectors = {selectors};
  const hooks = (window.__promptcastWatches = window.__promptcastWatches || {{}});
  const matches = (node) => node.nodeType === 1 && selectors.some((selector) => {{
    try {{
      return node.matches(selector) || node.querySelector(selector) !== null;
    }} catch (_) {{
      return false;
    }}
  }});
  return new Promise((resolve) => {{
    let timer = null;
    let observer = null;
    const finish = (found) => {{
      if (observer) observer.disconnect();
      clearTimeout(timer);
      delete hooks[id];
      resolve(found);
    }};
    observer = new MutationObserver((records) => {{
      for (const record of records) {{
        for (const node of record.addedNodes) {{
          if (matches(node)) {{
            finish(true);
            return;
          }}
        }}
      }}
    }});
    observer.observe(document.documentElement, {{ childList: true, subtree: true }});
    timer = setTimeout(() => finish(false), {timeout_ms});
    hooks[id] = () => finish(false);
  }});
}})()"#
    ))
}

pub fn cancel_watch_expression(id: &str) -> Result<String, serde_json::Error> {
    let id = serde_json::to_string(id)?;
    Ok(format!(
        r#"(() => {{
  const hooks = window.__promptcastWatches;
  if (hooks && typeof hooks[{id}] === 'function') {{
    hooks[{id}]();
  }}
  return true;
}})()"#
    ))
}

/// Argument list for a single string parameter.
pub fn string_arg(value: &str) -> Vec<Value> {
    vec![Value::String(value.to_string())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_expression_embeds_quoted_inputs() {
        let selectors = vec!["div[contenteditable=\"true\"]".to_string(), "textarea".to_string()];
        let script = watch_expression("w-1", &selectors, 2_500).unwrap();
        assert!(script.contains(r#"const id = "w-1";"#));
        assert!(script.contains(r#"["div[contenteditable=\"true\"]","textarea"]"#));
        assert!(script.contains("finish(false), 2500"));
    }

    #[test]
    fn cancel_expression_targets_the_watch() {
        let script = cancel_watch_expression("abc").unwrap();
        assert!(script.contains(r#"hooks["abc"]"#));
    }
}
