//! Sync error taxonomy
//!
//! Every failure mode of a synchronization attempt is surfaced to the
//! caller as one of these; the engine never retries and never swallows
//! an error.

use std::fmt;

use thiserror::Error;

use crate::document::FormatError;

/// Which request a transport failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Load,
    Save,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Load => write!(f, "load"),
            RequestKind::Save => write!(f, "save"),
        }
    }
}

/// The server spoke HTTP but broke the sync protocol
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("missing timestamp from server")]
    MissingTimestamp,

    #[error("invalid timestamp from server \"{0}\"")]
    InvalidTimestamp(String),

    #[error("failed to parse load response from server")]
    BadLoadDocument(#[source] FormatError),

    /// The server claims a state older than what this client already
    /// synced against; nothing sensible can be done automatically
    #[error("remote timestamp earlier than local timestamp")]
    RemoteEarlierThanLocal,

    #[error("failed to parse save response from server")]
    BadSaveDocument(#[source] FormatError),

    /// The echoed document differs structurally from what was sent
    #[error("bad save response from server")]
    EchoMismatch,
}

/// Errors raised by a synchronization attempt
#[derive(Error, Debug)]
pub enum SyncError {
    /// Sync was attempted without complete settings
    #[error("sync is not configured: {0}")]
    NotConfigured(&'static str),

    /// Non-200 status on load or save
    #[error("unexpected {kind} response from server: {status}")]
    Transport { kind: RequestKind, status: u16 },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The human declined the merge result
    #[error("merge aborted")]
    MergeAborted,

    #[error(transparent)]
    Format(#[from] FormatError),

    /// The request never produced a response
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error during sync: {0}")]
    Io(#[from] std::io::Error),
}
