//! Sprig core library
//!
//! Sprig is a personal hierarchical task list that is edited offline
//! and reconciled on demand against a single remote copy over HTTP.
//!
//! # Architecture
//!
//! - **Tree**: an ordered, labeled n-ary tree of tasks, addressed by
//!   sibling-index paths
//! - **Document**: the XML codec between trees and the tasklist wire
//!   format, plus the structural comparator used for echo verification
//! - **Store**: the on-disk aggregate holding `tasks.xml` and the sync
//!   config side by side
//! - **Sync**: the timestamp-based synchronization engine
//!
//! # Quick Start
//!
//! ```text
//! let mut store = TaskStore::open(data_dir)?;
//!
//! store.tree_mut().insert(&[], 0, "water the plants")?;
//! store.changes_made()?;
//!
//! let report = SyncEngine::new().synchronise(&mut store, &confirmer)?;
//! ```
//!
//! # Modules
//!
//! - `tree`: task tree and structural mutation
//! - `document`: tasklist document codec and comparator
//! - `config`: persisted synchronization settings
//! - `store`: on-disk task store (main entry point)
//! - `sync`: the synchronization engine

pub mod config;
pub mod document;
pub mod store;
pub mod sync;
pub mod tree;

pub use config::SyncConfig;
pub use document::FormatError;
pub use store::TaskStore;
pub use sync::{
    HttpTransport, MergeConfirmer, ProtocolError, Reconciliation, SyncEngine, SyncError,
    SyncReport, Transport,
};
pub use tree::{TaskNode, TaskTree, TreeError};
