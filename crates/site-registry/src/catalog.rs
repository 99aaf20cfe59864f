use crate::model::{InjectionMethod, SiteConfig};

/// Built-in chat sites, in their default display order.
pub fn builtin_sites() -> Vec<SiteConfig> {
    vec![
        SiteConfig::new("chatgpt", "ChatGPT", "https://chatgpt.com/")
            .with_color("#10a37f")
            .with_inputs(&[
                "#prompt-textarea[contenteditable=\"true\"]",
                "div.ProseMirror[contenteditable=\"true\"]",
                "textarea#prompt-textarea",
                "textarea[data-id=\"root\"]",
                "textarea",
            ])
            .with_submits(&[
                "button[data-testid=\"send-button\"]",
                "#composer-submit-button",
                "button[aria-label=\"Send prompt\"]",
            ])
            .with_stops(&[
                "button[data-testid=\"stop-button\"]",
                "button[aria-label=\"Stop streaming\"]",
            ]),
        SiteConfig::new("claude", "Claude", "https://claude.ai/new")
            .with_color("#d97757")
            .with_inputs(&[
                "div.ProseMirror[contenteditable=\"true\"]",
                "fieldset div[contenteditable=\"true\"]",
                "div[contenteditable=\"true\"]",
            ])
            .with_submits(&[
                "button[aria-label=\"Send message\"]",
                "button[aria-label=\"Send Message\"]",
                "fieldset button[type=\"button\"][aria-label*=\"Send\"]",
            ])
            .with_stops(&[
                "button[aria-label=\"Stop response\"]",
                "button[aria-label=\"Stop Response\"]",
            ])
            .with_cursor_to_end(true),
        SiteConfig::new("gemini", "Gemini", "https://gemini.google.com/app")
            .with_color("#4285f4")
            .with_inputs(&[
                "rich-textarea .ql-editor[contenteditable=\"true\"]",
                "div.ql-editor[contenteditable=\"true\"]",
                "div[contenteditable=\"true\"][role=\"textbox\"]",
            ])
            .with_submits(&[
                "button.send-button",
                "button[aria-label=\"Send message\"]",
            ])
            .with_stops(&["button.send-button.stop", "button[aria-label=\"Stop response\"]"]),
        SiteConfig::new("grok", "Grok", "https://grok.com/")
            .with_color("#1f2937")
            .with_inputs(&[
                "textarea[aria-label=\"Ask Grok anything\"]",
                "div.tiptap.ProseMirror[contenteditable=\"true\"]",
                "textarea",
            ])
            .with_submits(&[
                "button[type=\"submit\"][aria-label=\"Submit\"]",
                "form button[type=\"submit\"]",
            ])
            .with_stops(&["button[aria-label=\"Stop model response\"]"]),
        SiteConfig::new("perplexity", "Perplexity", "https://www.perplexity.ai/")
            .with_color("#20808d")
            .with_inputs(&[
                "#ask-input[contenteditable=\"true\"]",
                "div[contenteditable=\"true\"][role=\"textbox\"]",
                "textarea[placeholder*=\"Ask\"]",
                "textarea",
            ])
            .with_submits(&[
                "button[data-testid=\"submit-button\"]",
                "button[aria-label=\"Submit\"]",
            ])
            .with_stops(&[
                "button[data-testid=\"stop-generating-response-button\"]",
                "button[aria-label=\"Stop generating response\"]",
            ])
            .with_method(InjectionMethod::ExecCommand),
        SiteConfig::new("deepseek", "DeepSeek", "https://chat.deepseek.com/")
            .with_color("#4d6bfe")
            .with_inputs(&["textarea#chat-input", "textarea"])
            .with_submits(&["div[role=\"button\"].ds-button--primary", "button[type=\"submit\"]"])
            .disabled(),
        SiteConfig::new("mistral", "Le Chat", "https://chat.mistral.ai/chat")
            .with_color("#fa500f")
            .with_inputs(&[
                "div.ProseMirror[contenteditable=\"true\"]",
                "textarea",
            ])
            .with_submits(&[
                "button[aria-label=\"Send question\"]",
                "form button[type=\"submit\"]",
            ])
            .disabled(),
        SiteConfig::new("copilot", "Copilot", "https://copilot.microsoft.com/")
            .with_color("#0078d4")
            .with_inputs(&["textarea#userInput", "textarea"])
            .with_submits(&["button[aria-label=\"Submit message\"]"])
            .with_stops(&["button[aria-label=\"Stop responding\"]"])
            .disabled(),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let sites = builtin_sites();
        let mut ids = HashSet::new();
        for site in &sites {
            site.validate().unwrap();
            assert!(!site.input_selectors.is_empty(), "{} has no inputs", site.id);
            assert!(ids.insert(site.id.clone()), "duplicate id {}", site.id);
            assert!(site.color.starts_with('#') && site.color.len() == 7);
        }
    }

    #[test]
    fn generic_fallbacks_come_last() {
        for site in builtin_sites() {
            if let Some(pos) = site.input_selectors.iter().position(|s| s == "textarea") {
                assert_eq!(pos, site.input_selectors.len() - 1, "{}", site.id);
            }
        }
    }

    #[test]
    fn perplexity_uses_exec_command() {
        let pplx = builtin_sites()
            .into_iter()
            .find(|s| s.id.as_str() == "perplexity")
            .unwrap();
        assert_eq!(pplx.injection_method, InjectionMethod::ExecCommand);
    }
}
