//! Most-recent-first record of sent prompts.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use promptcast_core_types::SiteId;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub sites: Vec<SiteId>,
}

/// Bounded prompt history persisted as a JSON array.
///
/// Re-sending a prompt moves it to the front instead of adding a duplicate.
pub struct InputHistory {
    path: PathBuf,
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl InputHistory {
    /// Load `path`, starting empty when the file does not exist yet. A corrupt file is logged
    /// and replaced on the next save.
    pub async fn load(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let mut entries: VecDeque<HistoryEntry> = if fs::try_exists(&path).await.unwrap_or(false) {
            let raw = fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(target: "history", path = %path.display(), %err, "discarding unreadable history");
                    VecDeque::new()
                }
            }
        } else {
            VecDeque::new()
        };
        entries.truncate(capacity);
        Ok(Self {
            path,
            capacity,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Put `message` at the front. Blank messages are not recorded.
    pub fn record(&mut self, message: &str, sites: Vec<SiteId>, sent_at: DateTime<Utc>) {
        let message = message.trim();
        if message.is_empty() || self.capacity == 0 {
            return;
        }
        self.entries.retain(|entry| entry.message != message);
        self.entries.push_front(HistoryEntry {
            message: message.to_string(),
            sent_at,
            sites,
        });
        self.entries.truncate(self.capacity);
        debug!(target: "history", len = self.entries.len(), "recorded prompt");
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let serialized = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, serialized)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
