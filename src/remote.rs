//! The remote service contract consumed by the core, modeled on
//! `SyncTransport` (`src/sync/types.rs`): a narrow, `async_trait`,
//! `Send + Sync` surface the core drives without owning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::query::FindParams;
use crate::record::Record;

/// The four change topics the Engine subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteTopic {
    Created,
    Updated,
    Patched,
    Removed,
}

pub type RemoteEventCallback = Arc<dyn Fn(Record) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Convenience monotonic id generator for `RemoteService` implementations'
/// `subscribe`.
pub fn next_subscription_id() -> SubscriptionId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    SubscriptionId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// One page of a (possibly server-paginated) `find` result.
#[derive(Debug, Clone)]
pub struct RemotePage {
    pub data: Vec<Record>,
    pub total: usize,
    pub limit: usize,
    pub skip: usize,
}

/// The remote service a [`crate::replicator::Replicator`] binds to.
///
/// Implementations own network transport, authentication, and the actual
/// query/predicate evaluation on the server side.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn find(&self, params: &FindParams) -> Result<RemotePage, RemoteError>;
    async fn get(&self, id: &serde_json::Value, params: &FindParams) -> Result<Record, RemoteError>;
    async fn create(&self, data: Record, params: &FindParams) -> Result<Record, RemoteError>;
    async fn update(
        &self,
        id: &serde_json::Value,
        data: Record,
        params: &FindParams,
    ) -> Result<Record, RemoteError>;
    async fn patch(
        &self,
        id: &serde_json::Value,
        data: Record,
        params: &FindParams,
    ) -> Result<Record, RemoteError>;
    async fn remove(&self, id: &serde_json::Value, params: &FindParams) -> Result<Record, RemoteError>;

    /// Subscribe to one of the four change topics. Returns a handle used
    /// to `unsubscribe` later.
    fn subscribe(&self, topic: RemoteTopic, callback: RemoteEventCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}
