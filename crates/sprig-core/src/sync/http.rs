//! HTTP transport for the sync engine
//!
//! The engine only needs the status code, the `Timestamp` header and
//! the body of each response; everything protocol-shaped (status
//! checks, header parsing, echo verification) stays in the engine so it
//! can be tested against an in-memory transport.

use tracing::debug;

use super::error::SyncError;

/// Name of the header carrying the server's epoch-millisecond clock
pub const TIMESTAMP_HEADER: &str = "Timestamp";

/// What came back from the remote endpoint
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    /// Raw `Timestamp` header value, if the server sent one
    pub timestamp: Option<String>,
    pub body: Vec<u8>,
}

/// The two requests a sync attempt makes
pub trait Transport {
    /// Fetch the remote snapshot
    fn load(&self, url: &str) -> Result<RemoteResponse, SyncError>;

    /// Publish the local document, stamped with `timestamp`
    fn save(&self, url: &str, timestamp: i64, body: &[u8]) -> Result<RemoteResponse, SyncError>;
}

/// Production transport over blocking reqwest
///
/// Both requests are POSTs, synchronous, with no timeout and no retry;
/// a hung endpoint blocks the attempt indefinitely.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }

    fn collect(url: &str, response: reqwest::blocking::Response) -> Result<RemoteResponse, SyncError> {
        let status = response.status().as_u16();
        let timestamp = response
            .headers()
            .get(TIMESTAMP_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .map_err(|e| SyncError::Http {
                url: url.to_string(),
                source: e,
            })?
            .to_vec();
        debug!(url, status, bytes = body.len(), "response received");
        Ok(RemoteResponse {
            status,
            timestamp,
            body,
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn load(&self, url: &str) -> Result<RemoteResponse, SyncError> {
        debug!(url, "loading remote tree");
        let response = self.client.post(url).send().map_err(|e| SyncError::Http {
            url: url.to_string(),
            source: e,
        })?;
        Self::collect(url, response)
    }

    fn save(&self, url: &str, timestamp: i64, body: &[u8]) -> Result<RemoteResponse, SyncError> {
        debug!(url, timestamp, bytes = body.len(), "publishing local tree");
        let response = self
            .client
            .post(url)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(body.to_vec())
            .send()
            .map_err(|e| SyncError::Http {
                url: url.to_string(),
                source: e,
            })?;
        Self::collect(url, response)
    }
}
