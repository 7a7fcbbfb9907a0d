//! The synchronization engine
//!
//! One attempt reconciles the local tree against the single remote copy:
//!
//! 1. Fetch the remote snapshot and its `Timestamp` header.
//! 2. Refuse a non-bootstrap remote clock behind our last sync marker.
//! 3. Depending on (remote newer, local dirty): merge through the
//!    configured external tool behind a human confirmation gate, adopt
//!    the remote tree wholesale, or keep the local tree.
//! 4. Publish the resulting tree back, stamped with this attempt's
//!    publish time, and require the server to echo it intact.
//! 5. Only then clear the dirty flag and advance the sync marker.
//!
//! There is no retry, no timeout and no rollback; any failure aborts
//! the attempt and surfaces to the caller.

use std::fs;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::document::{self, FormatError};
use crate::store::TaskStore;

use super::error::{ProtocolError, RequestKind, SyncError};
use super::http::{HttpTransport, Transport};
use super::merge;

/// The human yes/no gate that approves an external merge result
pub trait MergeConfirmer {
    fn confirm_merge(&self) -> bool;
}

impl<F> MergeConfirmer for F
where
    F: Fn() -> bool,
{
    fn confirm_merge(&self) -> bool {
        self()
    }
}

/// How the local tree was reconciled during an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Remote was newer and local edits existed; the external tool ran
    Merged,
    /// Remote was newer and the local tree was clean; it was adopted
    Replaced,
    /// Remote was not newer; the local tree was kept as-is
    Unchanged,
}

/// Outcome of a successful attempt
#[derive(Debug)]
pub struct SyncReport {
    pub reconciliation: Reconciliation,
    /// The timestamp the server was stamped with, now the sync marker
    pub publish_time: i64,
    /// The timestamp the server reported during load
    pub remote_time: i64,
}

pub struct SyncEngine<T: Transport> {
    transport: T,
}

impl SyncEngine<HttpTransport> {
    pub fn new() -> Self {
        Self {
            transport: HttpTransport::new(),
        }
    }
}

impl Default for SyncEngine<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> SyncEngine<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Run one synchronization attempt
    ///
    /// The caller must not start a second attempt for the same store
    /// while one is in flight; the engine holds no lock of its own.
    pub fn synchronise(
        &self,
        store: &mut TaskStore,
        confirmer: &dyn MergeConfirmer,
    ) -> Result<SyncReport, SyncError> {
        let config = store.config();
        let load_url = config
            .load_url
            .clone()
            .ok_or(SyncError::NotConfigured("no load URL defined"))?;
        let save_url = config
            .save_url
            .clone()
            .ok_or(SyncError::NotConfigured("no save URL defined"))?;
        let merge_command = config
            .merge_command
            .clone()
            .ok_or(SyncError::NotConfigured("no merge command defined"))?;
        let last_sync = config.last_sync;
        let dirty = config.unsynched_changes;

        let publish_time = Utc::now().timestamp_millis();
        info!(last_sync, dirty, "starting sync attempt");

        let response = self.transport.load(&load_url)?;
        if response.status != 200 {
            return Err(SyncError::Transport {
                kind: RequestKind::Load,
                status: response.status,
            });
        }
        let header = response.timestamp.ok_or(ProtocolError::MissingTimestamp)?;
        let remote_time: i64 = header
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidTimestamp(header.clone()))?;

        let body = std::str::from_utf8(&response.body).map_err(|_| {
            ProtocolError::BadLoadDocument(FormatError::Syntax(
                "response body is not valid UTF-8".into(),
            ))
        })?;
        let remote_document =
            document::parse_document(body).map_err(ProtocolError::BadLoadDocument)?;
        let remote_tree =
            document::from_document(&remote_document).map_err(ProtocolError::BadLoadDocument)?;

        // A remote clock behind our own sync marker means the server lost
        // data we already synced against. A remote time of exactly zero is
        // the bootstrap sentinel for a server with no prior data.
        if remote_time != 0 && remote_time < last_sync {
            warn!(remote_time, last_sync, "remote is behind this client");
            return Err(ProtocolError::RemoteEarlierThanLocal.into());
        }

        let reconciliation = if remote_time > last_sync {
            if dirty {
                debug!(remote_time, "remote is newer and local edits exist");
                self.merge(store, &merge_command, &response.body, confirmer)?;
                Reconciliation::Merged
            } else {
                debug!(remote_time, "remote is newer, adopting it");
                store.replace_tree(remote_tree);
                store.save()?;
                Reconciliation::Replaced
            }
        } else {
            Reconciliation::Unchanged
        };

        // Publish even when nothing changed locally, so the server's record
        // of the last sync stays current.
        let sent = document::to_document(store.tree());
        let outgoing = document::write_document(&sent)?;
        let response = self
            .transport
            .save(&save_url, publish_time, outgoing.as_bytes())?;
        if response.status != 200 {
            return Err(SyncError::Transport {
                kind: RequestKind::Save,
                status: response.status,
            });
        }
        let echo_text = std::str::from_utf8(&response.body).map_err(|_| {
            ProtocolError::BadSaveDocument(FormatError::Syntax(
                "response body is not valid UTF-8".into(),
            ))
        })?;
        let echo =
            document::parse_document(echo_text).map_err(ProtocolError::BadSaveDocument)?;
        if !document::documents_equal(&sent, &echo) {
            return Err(ProtocolError::EchoMismatch.into());
        }

        let config = store.config_mut();
        config.unsynched_changes = false;
        config.last_sync = publish_time;
        store.save_config()?;
        info!(publish_time, ?reconciliation, "sync complete");

        Ok(SyncReport {
            reconciliation,
            publish_time,
            remote_time,
        })
    }

    fn merge(
        &self,
        store: &mut TaskStore,
        merge_command: &str,
        remote_body: &[u8],
        confirmer: &dyn MergeConfirmer,
    ) -> Result<(), SyncError> {
        // both versions must be on disk before the tool runs
        store.save()?;
        let snapshot = store.merge_path();
        fs::write(&snapshot, remote_body)?;

        merge::run_merge_tool(merge_command, &store.tasks_path(), &snapshot)?;

        if !confirmer.confirm_merge() {
            // the tool may already have rewritten the primary file; no
            // rollback is attempted and the snapshot stays for inspection
            warn!("merge declined, aborting sync attempt");
            return Err(SyncError::MergeAborted);
        }

        fs::remove_file(&snapshot)?;
        // pick up whatever the merge tool left in the primary file
        store.reload()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::http::RemoteResponse;
    use std::cell::{Cell, RefCell};
    use tempfile::TempDir;

    const EMPTY_DOC: &str = "<tasklist><tasks/></tasklist>";
    const REMOTE_DOC: &str = "<tasklist>\n\t<tasks>\n\t\t<task label=\"foo\">\n\t\t\t<task label=\"bar\" />\n\t\t</task>\n\t\t<task label=\"weh\"/>\n\t</tasks>\n</tasklist>\n";

    /// Scripted transport that records requests and echoes saves back
    struct FakeRemote {
        load_status: u16,
        timestamp: Option<String>,
        body: Vec<u8>,
        save_status: u16,
        echo_override: Option<Vec<u8>>,
        loads: Cell<usize>,
        saves: RefCell<Vec<Vec<u8>>>,
    }

    impl FakeRemote {
        fn new(timestamp: &str, body: &str) -> Self {
            Self {
                load_status: 200,
                timestamp: Some(timestamp.to_string()),
                body: body.as_bytes().to_vec(),
                save_status: 200,
                echo_override: None,
                loads: Cell::new(0),
                saves: RefCell::new(Vec::new()),
            }
        }

        fn load_status(mut self, status: u16) -> Self {
            self.load_status = status;
            self
        }

        fn save_status(mut self, status: u16) -> Self {
            self.save_status = status;
            self
        }

        fn no_timestamp(mut self) -> Self {
            self.timestamp = None;
            self
        }

        fn echo(mut self, body: &str) -> Self {
            self.echo_override = Some(body.as_bytes().to_vec());
            self
        }
    }

    impl Transport for FakeRemote {
        fn load(&self, _url: &str) -> Result<RemoteResponse, SyncError> {
            self.loads.set(self.loads.get() + 1);
            Ok(RemoteResponse {
                status: self.load_status,
                timestamp: self.timestamp.clone(),
                body: self.body.clone(),
            })
        }

        fn save(&self, _url: &str, _timestamp: i64, body: &[u8]) -> Result<RemoteResponse, SyncError> {
            self.saves.borrow_mut().push(body.to_vec());
            Ok(RemoteResponse {
                status: self.save_status,
                timestamp: None,
                body: self
                    .echo_override
                    .clone()
                    .unwrap_or_else(|| body.to_vec()),
            })
        }
    }

    fn configured_store(dir: &TempDir) -> TaskStore {
        let mut store = TaskStore::open(dir.path()).unwrap();
        let config = store.config_mut();
        config.load_url = Some("http://remote/load".to_string());
        config.save_url = Some("http://remote/save".to_string());
        config.merge_command = Some("true".to_string());
        config.last_sync = 1000;
        config.unsynched_changes = false;
        store.save_config().unwrap();
        store
    }

    fn engine(remote: FakeRemote) -> SyncEngine<FakeRemote> {
        SyncEngine::with_transport(remote)
    }

    const YES: fn() -> bool = || true;
    const NO: fn() -> bool = || false;

    #[test]
    fn test_fails_without_configuration() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();

        let err = engine(FakeRemote::new("0", EMPTY_DOC))
            .synchronise(&mut store, &YES)
            .unwrap_err();
        assert!(matches!(err, SyncError::NotConfigured("no load URL defined")));
    }

    #[test]
    fn test_load_transport_error() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let err = engine(FakeRemote::new("2000", EMPTY_DOC).load_status(404))
            .synchronise(&mut store, &YES)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Transport { kind: RequestKind::Load, status: 404 }
        ));
    }

    #[test]
    fn test_missing_timestamp_header() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let err = engine(FakeRemote::new("2000", EMPTY_DOC).no_timestamp())
            .synchronise(&mut store, &YES)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::MissingTimestamp)
        ));
    }

    #[test]
    fn test_invalid_timestamp_header() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let err = engine(FakeRemote::new("soon", EMPTY_DOC))
            .synchronise(&mut store, &YES)
            .unwrap_err();
        match err {
            SyncError::Protocol(ProtocolError::InvalidTimestamp(raw)) => {
                assert_eq!(raw, "soon");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparsable_load_body() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let err = engine(FakeRemote::new("2000", "<tasklist><items/></tasklist>"))
            .synchronise(&mut store, &YES)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::BadLoadDocument(_))
        ));
    }

    #[test]
    fn test_conflict_guard_rejects_older_remote() {
        // the guard applies whatever the dirty flag says
        for dirty in [false, true] {
            let dir = TempDir::new().unwrap();
            let mut store = configured_store(&dir);
            store.config_mut().unsynched_changes = dirty;

            let remote = FakeRemote::new("500", EMPTY_DOC);
            let eng = engine(remote);
            let err = eng.synchronise(&mut store, &YES).unwrap_err();
            assert!(matches!(
                err,
                SyncError::Protocol(ProtocolError::RemoteEarlierThanLocal)
            ));
            // aborted before anything was published
            assert!(eng.transport.saves.borrow().is_empty());
            assert_eq!(store.config().last_sync, 1000);
            assert_eq!(store.config().unsynched_changes, dirty);
        }
    }

    #[test]
    fn test_bootstrap_sentinel_bypasses_guard() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let before = Utc::now().timestamp_millis();
        let report = engine(FakeRemote::new("0", EMPTY_DOC))
            .synchronise(&mut store, &YES)
            .unwrap();

        assert_eq!(report.reconciliation, Reconciliation::Unchanged);
        assert!(store.config().last_sync >= before);
        assert!(!store.config().unsynched_changes);
    }

    #[test]
    fn test_noop_keeps_local_file_untouched() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        store.tree_mut().insert(&[], 0, "kept").unwrap();
        store.save().unwrap();
        let before = std::fs::read(store.tasks_path()).unwrap();

        let report = engine(FakeRemote::new("1000", EMPTY_DOC))
            .synchronise(&mut store, &YES)
            .unwrap();

        assert_eq!(report.reconciliation, Reconciliation::Unchanged);
        assert_eq!(std::fs::read(store.tasks_path()).unwrap(), before);
        assert_eq!(store.tree().get(&[0]).unwrap().label(), "kept");
    }

    #[test]
    fn test_publish_happens_even_for_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let remote = FakeRemote::new("1000", EMPTY_DOC);
        let eng = engine(remote);
        eng.synchronise(&mut store, &YES).unwrap();

        assert_eq!(eng.transport.loads.get(), 1);
        assert_eq!(eng.transport.saves.borrow().len(), 1);
    }

    #[test]
    fn test_replace_path_adopts_remote_tree() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        store.tree_mut().insert(&[], 0, "stale local").unwrap();
        store.save().unwrap();

        let report = engine(FakeRemote::new("2000", REMOTE_DOC))
            .synchronise(&mut store, &YES)
            .unwrap();

        assert_eq!(report.reconciliation, Reconciliation::Replaced);
        assert_eq!(report.remote_time, 2000);
        assert_eq!(store.tree().get(&[0]).unwrap().label(), "foo");
        assert_eq!(store.tree().get(&[0, 0]).unwrap().label(), "bar");
        assert_eq!(store.tree().get(&[1]).unwrap().label(), "weh");
        assert!(!store.config().unsynched_changes);
        assert!(store.config().last_sync > 1000);

        // the adopted tree reached the primary file
        let mut reread = TaskStore::open(dir.path()).unwrap();
        reread.reload().unwrap();
        assert_eq!(reread.tree(), store.tree());
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_path_runs_tool_once_and_confirms() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        store.tree_mut().insert(&[], 0, "mine").unwrap();
        store.changes_made().unwrap();
        store.config_mut().last_sync = 1000;
        let log = dir.path().join("merge.log");
        store.config_mut().merge_command = Some(format!(
            "test -f {{0}} && test -f {{1}} && echo ok >> {}",
            log.display()
        ));

        let report = engine(FakeRemote::new("2000", REMOTE_DOC))
            .synchronise(&mut store, &YES)
            .unwrap();

        assert_eq!(report.reconciliation, Reconciliation::Merged);
        // invoked exactly once, with both files present at the time
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "ok\n");
        // the tool left the primary file alone, so the local tree stands
        assert_eq!(store.tree().get(&[0]).unwrap().label(), "mine");
        // the snapshot is cleaned up after confirmation
        assert!(!store.merge_path().exists());
        assert!(!store.config().unsynched_changes);
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_path_reloads_tool_output() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        store.tree_mut().insert(&[], 0, "mine").unwrap();
        store.changes_made().unwrap();
        store.config_mut().last_sync = 1000;
        // a "merge" that just takes the remote side
        store.config_mut().merge_command = Some("cat {1} > {0}".to_string());

        engine(FakeRemote::new("2000", REMOTE_DOC))
            .synchronise(&mut store, &YES)
            .unwrap();

        assert_eq!(store.tree().get(&[0]).unwrap().label(), "foo");
        assert_eq!(store.tree().get(&[1]).unwrap().label(), "weh");
    }

    #[cfg(unix)]
    #[test]
    fn test_declined_merge_aborts_without_state_change() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        store.tree_mut().insert(&[], 0, "mine").unwrap();
        store.changes_made().unwrap();
        store.config_mut().last_sync = 1000;

        let remote = FakeRemote::new("2000", REMOTE_DOC);
        let eng = engine(remote);
        let err = eng.synchronise(&mut store, &NO).unwrap_err();

        assert!(matches!(err, SyncError::MergeAborted));
        assert!(store.config().unsynched_changes);
        assert_eq!(store.config().last_sync, 1000);
        // nothing was published and the snapshot was left behind
        assert!(eng.transport.saves.borrow().is_empty());
        assert!(store.merge_path().exists());
    }

    #[test]
    fn test_save_transport_error() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let err = engine(FakeRemote::new("1000", EMPTY_DOC).save_status(500))
            .synchronise(&mut store, &YES)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Transport { kind: RequestKind::Save, status: 500 }
        ));
    }

    #[test]
    fn test_unparsable_echo() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);

        let err = engine(FakeRemote::new("1000", EMPTY_DOC).echo("mangled"))
            .synchronise(&mut store, &YES)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::BadSaveDocument(_))
        ));
    }

    #[test]
    fn test_echo_mismatch_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        store.config_mut().unsynched_changes = true;
        store.tree_mut().insert(&[], 0, "mine").unwrap();
        store.save().unwrap();

        let altered = "<tasklist><tasks><task label=\"tampered\"/></tasks></tasklist>";
        let err = engine(FakeRemote::new("1000", EMPTY_DOC).echo(altered))
            .synchronise(&mut store, &YES)
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::EchoMismatch)
        ));
        assert!(store.config().unsynched_changes);
        assert_eq!(store.config().last_sync, 1000);
    }

    #[test]
    fn test_reindented_echo_still_matches() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        store.tree_mut().insert(&[], 0, "kept").unwrap();
        store.save().unwrap();

        // a server that strips all whitespace from its echo
        let squashed = "<tasklist><tasks><task label=\"kept\"/></tasks></tasklist>";
        engine(FakeRemote::new("1000", EMPTY_DOC).echo(squashed))
            .synchronise(&mut store, &YES)
            .unwrap();
    }

    #[test]
    fn test_end_to_end_empty_tree() {
        let dir = TempDir::new().unwrap();
        let mut store = configured_store(&dir);
        assert!(store.tree().is_empty());

        let before = Utc::now().timestamp_millis();
        let report = engine(FakeRemote::new("1000", EMPTY_DOC))
            .synchronise(&mut store, &YES)
            .unwrap();

        assert!(store.tree().is_empty());
        assert!(report.publish_time >= before);
        assert_eq!(store.config().last_sync, report.publish_time);
        assert!(!store.config().unsynched_changes);

        // the new state was persisted
        let saved = crate::config::SyncConfig::load(&store.config_path()).unwrap();
        assert_eq!(saved.last_sync, report.publish_time);
        assert!(!saved.unsynched_changes);
    }
}
