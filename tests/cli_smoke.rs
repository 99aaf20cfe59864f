use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = format!(
            "preferences_path: {}\nhistory:\n  path: {}\n",
            dir.path().join("prefs.json").display(),
            dir.path().join("history.json").display(),
        );
        std::fs::write(dir.path().join("config.yaml"), config).expect("write config");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> PathBuf {
        self.path().join("config.yaml")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("promptcast").expect("binary built");
        cmd.current_dir(self.path())
            .env_remove("PROMPTCAST_WS_URL")
            .env_remove("PROMPTCAST_PREFS")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config())
            .args(args);
        cmd
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn sites_list_reports_the_builtin_catalog() {
    let ws = Workspace::new();
    let assert = ws.command(&["sites", "list", "--output", "json"]).assert().success();
    let value = stdout_json(assert.get_output());
    let sites = value.as_array().expect("array of sites");
    assert_eq!(sites.len(), 8);
    assert_eq!(sites[0]["id"].as_str(), Some("chatgpt"));
    let deepseek = sites
        .iter()
        .find(|site| site["id"] == "deepseek")
        .expect("deepseek listed");
    assert_eq!(deepseek["enabled"].as_bool(), Some(false));
}

#[test]
fn sites_disable_and_order_are_persisted() {
    let ws = Workspace::new();
    ws.command(&["sites", "disable", "grok"]).assert().success();
    ws.command(&["sites", "order", "claude,gemini"]).assert().success();
    assert!(ws.path().join("prefs.json").exists());

    let assert = ws.command(&["-o", "json", "sites", "list"]).assert().success();
    let value = stdout_json(assert.get_output());
    let sites = value.as_array().expect("array of sites");
    assert_eq!(sites[0]["id"].as_str(), Some("claude"));
    assert_eq!(sites[1]["id"].as_str(), Some("gemini"));
    let grok = sites.iter().find(|site| site["id"] == "grok").expect("grok listed");
    assert_eq!(grok["enabled"].as_bool(), Some(false));
}

#[test]
fn unknown_site_ids_are_rejected() {
    let ws = Workspace::new();
    let assert = ws.command(&["sites", "enable", "nope"]).assert().failure();
    assert!(stderr(assert.get_output()).contains("unknown site 'nope'"));

    let assert = ws
        .command(&["send", "--sites", "nope", "hello there"])
        .assert()
        .failure();
    assert!(stderr(assert.get_output()).contains("unknown site 'nope'"));
}

#[test]
fn blank_prompt_fails_before_a_browser_is_needed() {
    let ws = Workspace::new();
    let assert = ws.command(&["send", "   "]).assert().failure();
    assert!(stderr(assert.get_output()).contains("invalid message"));
    assert!(!ws.path().join("history.json").exists());
}

#[test]
fn config_path_names_the_configured_files() {
    let ws = Workspace::new();
    let assert = ws.command(&["config", "path", "--output", "json"]).assert().success();
    let value = stdout_json(assert.get_output());
    assert_eq!(value["config"].as_str(), ws.config().to_str());
    assert_eq!(value["exists"].as_bool(), Some(true));
    assert_eq!(
        value["history"].as_str(),
        ws.path().join("history.json").to_str()
    );
}

#[test]
fn config_reset_then_validate() {
    let ws = Workspace::new();
    ws.command(&["config", "reset"]).assert().success();
    let written = std::fs::read_to_string(ws.config()).expect("config written");
    assert!(written.contains("max_retries"));
    ws.command(&["config", "validate"]).assert().success();
}

#[test]
fn malformed_config_is_reported() {
    let ws = Workspace::new();
    std::fs::write(ws.config(), "batch: [unclosed").expect("write config");
    let assert = ws.command(&["sites", "list"]).assert().failure();
    assert!(stderr(assert.get_output()).contains("config.yaml"));
}

#[test]
fn history_starts_empty_and_clears() {
    let ws = Workspace::new();
    let assert = ws.command(&["history", "list"]).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("No prompts sent yet."));

    ws.command(&["history", "clear"]).assert().success();
    let assert = ws.command(&["history", "list", "-o", "json"]).assert().success();
    assert_eq!(stdout_json(assert.get_output()), Value::Array(Vec::new()));
}
