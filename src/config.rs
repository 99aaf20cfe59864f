//! Application configuration.
//!
//! Every section deserializes from a partial YAML document; missing keys keep their defaults.

use std::env;
use std::path::PathBuf;

use broadcast_orchestrator::BatchPolicy;
use cdp_adapter::CdpConfig;
use page_injector::InjectionPolicy;
use promptcast_sites::SiteConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ENV_WS_URL: &str = "PROMPTCAST_WS_URL";
pub const ENV_HEADLESS: &str = "PROMPTCAST_HEADLESS";
pub const ENV_CHROME: &str = "PROMPTCAST_CHROME";
pub const ENV_PREFS: &str = "PROMPTCAST_PREFS";

const APP_DIR: &str = "promptcast";
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cdp: CdpConfig,
    pub injection: InjectionPolicy,
    pub batch: BatchPolicy,
    /// Where site enable flags and ordering are persisted.
    pub preferences_path: Option<PathBuf>,
    pub history: HistoryConfig,
    /// Extra sites; an entry whose id matches a built-in site replaces it.
    pub sites: Vec<SiteConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: Option<PathBuf>,
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl Config {
    pub fn preferences_file(&self) -> PathBuf {
        self.preferences_path
            .clone()
            .unwrap_or_else(|| data_dir().join("preferences.json"))
    }

    pub fn history_file(&self) -> PathBuf {
        self.history
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join("history.json"))
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_var(ENV_WS_URL) {
            info!(target: "config", "using DevTools endpoint from {ENV_WS_URL}");
            self.cdp.websocket_url = Some(url);
        }
        if let Some(raw) = non_empty_var(ENV_HEADLESS) {
            match parse_flag(&raw) {
                Some(flag) => self.cdp.headless = flag,
                None => warn!(target: "config", value = %raw, "ignoring unrecognised {ENV_HEADLESS}"),
            }
        }
        if let Some(path) = non_empty_var(ENV_CHROME) {
            self.cdp.executable = PathBuf::from(path);
        }
        if let Some(path) = non_empty_var(ENV_PREFS) {
            self.preferences_path = Some(PathBuf::from(path));
        }
    }
}

/// `<data_dir>/promptcast`, or `./.promptcast` when the platform has no data directory.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".promptcast"))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let raw = r#"
batch:
  max_retries: 5
injection:
  stop_timeout_ms: 1000
history:
  capacity: 10
sites:
  - id: local
    name: Local
    url: http://localhost:3000/
    input_selectors: ["textarea"]
"#;
        let config: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.batch.max_retries, 5);
        assert_eq!(config.batch.base_delay_ms, 1_000);
        assert_eq!(config.injection.stop_timeout_ms, 1_000);
        assert_eq!(config.injection.submit_attempts, 3);
        assert_eq!(config.history.capacity, 10);
        assert_eq!(config.sites[0].id.as_str(), "local");
        assert!(config.sites[0].enabled);
        assert_eq!(config.cdp.default_deadline_ms, 30_000);
    }

    #[test]
    #[serial]
    fn environment_overrides_file_values() {
        env::set_var(ENV_WS_URL, "ws://127.0.0.1:9222/devtools/browser/abc");
        env::set_var(ENV_HEADLESS, "yes");
        env::set_var(ENV_PREFS, "/tmp/prefs.json");
        let mut config = Config::default();
        config.cdp.headless = false;
        config.apply_env_overrides();
        env::remove_var(ENV_WS_URL);
        env::remove_var(ENV_HEADLESS);
        env::remove_var(ENV_PREFS);

        assert_eq!(
            config.cdp.websocket_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc")
        );
        assert!(config.cdp.headless);
        assert_eq!(config.preferences_file(), PathBuf::from("/tmp/prefs.json"));
    }

    #[test]
    #[serial]
    fn unparsable_headless_flag_is_ignored() {
        env::set_var(ENV_HEADLESS, "sometimes");
        let mut config = Config::default();
        config.cdp.headless = true;
        config.apply_env_overrides();
        env::remove_var(ENV_HEADLESS);
        assert!(config.cdp.headless);
    }
}
