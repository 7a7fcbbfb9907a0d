//! On-disk task store
//!
//! Owns the task tree, the sync config and the data directory holding
//! `tasks.xml`, `config.toml` and the transient merge snapshot. The
//! editor mutates the tree through [`TaskStore::tree_mut`] and reports
//! every structural change through [`TaskStore::changes_made`], which
//! flips the dirty flag and persists both files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::SyncConfig;
use crate::document::{self, FormatError};
use crate::tree::TaskTree;

pub const TASKS_FILE: &str = "tasks.xml";
pub const MERGE_FILE: &str = "merge-temp.xml";
pub const CONFIG_FILE: &str = "config.toml";

pub struct TaskStore {
    tree: TaskTree,
    config: SyncConfig,
    data_dir: PathBuf,
}

impl TaskStore {
    /// Open the store, creating the data directory and default files on
    /// first run
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, FormatError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| FormatError::io(&data_dir, e))?;

        let mut store = Self {
            tree: TaskTree::new(),
            config: SyncConfig::load(&data_dir.join(CONFIG_FILE))?,
            data_dir,
        };
        if !store.tasks_path().exists() {
            debug!(path = %store.tasks_path().display(), "creating empty task file");
            store.save()?;
        }
        store.reload()?;
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join(TASKS_FILE)
    }

    pub fn merge_path(&self) -> PathBuf {
        self.data_dir.join(MERGE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TaskTree {
        &mut self.tree
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SyncConfig {
        &mut self.config
    }

    /// Persist the tree to `tasks.xml`
    pub fn save(&self) -> Result<(), FormatError> {
        let text = document::serialize(&self.tree)?;
        fs::write(self.tasks_path(), text).map_err(|e| FormatError::io(self.tasks_path(), e))
    }

    /// Re-read the tree from `tasks.xml`, dropping the in-memory one
    pub fn reload(&mut self) -> Result<(), FormatError> {
        let text = fs::read_to_string(self.tasks_path())
            .map_err(|e| FormatError::io(self.tasks_path(), e))?;
        self.tree = document::parse(&text)?;
        Ok(())
    }

    /// Adopt `tree` as the local tree wholesale
    pub fn replace_tree(&mut self, tree: TaskTree) {
        self.tree = tree;
    }

    /// Persist the sync config
    pub fn save_config(&self) -> Result<(), FormatError> {
        self.config.save(&self.config_path())
    }

    /// Record that the tree was edited locally
    ///
    /// Marks the store dirty and persists both the tree and the config,
    /// so a crash cannot lose the edit or the flag.
    pub fn changes_made(&mut self) -> Result<(), FormatError> {
        self.config.unsynched_changes = true;
        self.save()?;
        self.save_config()
    }
}
