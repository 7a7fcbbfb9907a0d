//! Synchronization against a single remote copy
//!
//! Timestamp-based reconciliation over plain HTTP. The server keeps one
//! document and the epoch-millisecond time it was last published; the
//! client keeps a matching `last-sync` marker and a dirty flag. From
//! those two facts each attempt picks one of three paths: adopt the
//! remote tree, merge through an external tool behind a human
//! confirmation gate, or push the local tree unchanged.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::new();
//! let report = engine.synchronise(&mut store, &confirmer)?;
//! ```

mod engine;
mod error;
mod http;
mod merge;

pub use engine::{MergeConfirmer, Reconciliation, SyncEngine, SyncReport};
pub use error::{ProtocolError, RequestKind, SyncError};
pub use http::{HttpTransport, RemoteResponse, Transport, TIMESTAMP_HEADER};
pub use merge::{render_command, run_merge_tool};
