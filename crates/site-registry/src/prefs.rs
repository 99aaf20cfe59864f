use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use promptcast_core_types::SiteId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::SiteError;

/// User choices layered over the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub enabled: BTreeMap<SiteId, bool>,
    #[serde(default)]
    pub order: Vec<SiteId>,
}

pub trait PreferencesStore: Send + Sync {
    fn load(&self) -> Result<Preferences, SiteError>;
    fn save(&self, prefs: &Preferences) -> Result<(), SiteError>;
}

#[derive(Default)]
pub struct MemoryPreferences {
    inner: Mutex<Preferences>,
}

impl MemoryPreferences {
    pub fn new(initial: Preferences) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

impl PreferencesStore for MemoryPreferences {
    fn load(&self) -> Result<Preferences, SiteError> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, prefs: &Preferences) -> Result<(), SiteError> {
        *self.inner.lock() = prefs.clone();
        Ok(())
    }
}

/// Preferences persisted as a small JSON document.
pub struct JsonFilePreferences {
    path: PathBuf,
}

impl JsonFilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SiteError {
        SiteError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PreferencesStore for JsonFilePreferences {
    fn load(&self) -> Result<Preferences, SiteError> {
        if !self.path.exists() {
            debug!(target: "sites", path = %self.path.display(), "no preferences file; using defaults");
            return Ok(Preferences::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| self.io_error(err))?;
        if raw.trim().is_empty() {
            return Ok(Preferences::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, prefs: &Preferences) -> Result<(), SiteError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }
        let body = serde_json::to_string_pretty(prefs)?;
        fs::write(&self.path, body).map_err(|err| self.io_error(err))
    }
}
