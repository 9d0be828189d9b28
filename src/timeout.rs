//! Time-limited remote invocation. Consumed exclusively by the Mutator: a
//! timeout is never re-raised, it leaves the queue entry in place for
//! later replay by `Replicator::connect`.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::error::RemoteError;

/// Outcome of a time-limited remote call: success, a remote-reported
/// failure, or an elapsed time limit, kept as three distinct variants
/// rather than a bare `Result`.
#[derive(Debug, Clone)]
pub enum RemoteOutcome<T> {
    Success(T),
    Failure(RemoteError),
    TimedOut { args: Value, limit: Duration },
}

impl<T> RemoteOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RemoteOutcome::Success(_))
    }
}

/// Runs `fut` to completion or gives up after `limit`. A late success
/// after the limit elapses is dropped — the caller never awaits it further.
pub async fn call_with_timeout<F, T>(fut: F, limit: Duration, args: Value) -> RemoteOutcome<T>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => RemoteOutcome::Success(value),
        Ok(Err(err)) => RemoteOutcome::Failure(err),
        Err(_elapsed) => RemoteOutcome::TimedOut { args, limit },
    }
}
