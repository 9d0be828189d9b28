//! Crate-wide error taxonomy.

use serde_json::Value;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Target record absent for `get`/`update`/`patch`/`remove`.
    #[error("record not found")]
    NotFound,

    /// Invariant violation: duplicate uuid on create, missing uuid on
    /// update, mutation while disconnected, impossible queue coalescing.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Remote call exceeded its time limit. Non-fatal at the Mutator
    /// boundary — the queue entry is preserved for later replay.
    #[error("remote call timed out after {limit_ms}ms")]
    Timeout { args: Value, limit_ms: u64 },

    /// Any other failure reported by the remote service.
    #[error("remote error: {0}")]
    Remote(String),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }
}

/// Transport-level error surfaced by a [`crate::remote::RemoteService`]
/// implementation. Kept distinct from [`Error`] the way the teacher keeps
/// `SyncTransportError` distinct from the storage-layer error type.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Error::Remote(e.message)
    }
}
