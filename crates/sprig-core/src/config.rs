//! Synchronization settings
//!
//! Persisted as TOML in the data directory. The two URL fields and the
//! merge command are owned by the user; `last-sync` and
//! `unsynched-changes` are bookkeeping the sync engine maintains and are
//! only ever updated on a successful sync (or, for the dirty flag, on a
//! local edit).

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::document::FormatError;

/// Persisted sync state and endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// URL the remote tree is loaded from
    #[serde(rename = "load-url", default)]
    pub load_url: Option<String>,

    /// URL the local tree is published to
    #[serde(rename = "save-url", default)]
    pub save_url: Option<String>,

    /// External merge command template; `{0}` is the local file,
    /// `{1}` the remote snapshot
    #[serde(rename = "merge-command", default)]
    pub merge_command: Option<String>,

    /// Timestamp of the last successful sync, epoch milliseconds
    #[serde(rename = "last-sync", default)]
    pub last_sync: i64,

    /// Whether local edits exist that the remote has not seen
    #[serde(rename = "unsynched-changes", default = "default_dirty")]
    pub unsynched_changes: bool,
}

fn default_dirty() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            load_url: None,
            save_url: None,
            merge_command: None,
            last_sync: 0,
            unsynched_changes: true,
        }
    }
}

impl SyncConfig {
    /// Load the config file, creating it with defaults if missing
    ///
    /// Empty-string fields are treated as absent. A missing or sparse
    /// file is not an error; a structurally invalid one is.
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        let content = fs::read_to_string(path).map_err(|e| FormatError::io(path, e))?;
        let config: SyncConfig =
            toml::from_str(&content).map_err(|e| FormatError::Config(e.to_string()))?;
        Ok(config.normalized())
    }

    /// Write the config file, one described field per entry
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        fs::write(path, self.render()).map_err(|e| FormatError::io(path, e))
    }

    /// True when everything a sync attempt needs is present
    pub fn has_sync_capability(&self) -> bool {
        self.load_url.is_some() && self.save_url.is_some() && self.merge_command.is_some()
    }

    fn normalized(mut self) -> Self {
        for field in [
            &mut self.load_url,
            &mut self.save_url,
            &mut self.merge_command,
        ] {
            if field.as_deref() == Some("") {
                *field = None;
            }
        }
        self
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# URL used to load the task tree from the remote server\nload-url = {}\n",
            toml_string(self.load_url.as_deref())
        );
        let _ = writeln!(
            out,
            "# URL used to save the task tree to the remote server\nsave-url = {}\n",
            toml_string(self.save_url.as_deref())
        );
        let _ = writeln!(
            out,
            "# Command executed to merge task tree versions. Use {{0}} for the local file, {{1}} for the remote snapshot\nmerge-command = {}\n",
            toml_string(self.merge_command.as_deref())
        );
        let _ = writeln!(
            out,
            "# Timestamp of the last sync, in epoch milliseconds. Do not edit!\nlast-sync = {}\n",
            self.last_sync
        );
        let _ = writeln!(
            out,
            "# Changes made since the last sync. Do not edit!\nunsynched-changes = {}",
            self.unsynched_changes
        );
        out
    }
}

/// Render an optional string as a quoted TOML value, absent as ""
fn toml_string(value: Option<&str>) -> String {
    toml::Value::String(value.unwrap_or_default().to_string()).to_string()
}
