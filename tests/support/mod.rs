//! In-memory `RemoteService` fake used by the integration tests. Supports
//! injected latency, failure, and timeout via `_fail`/`_timeout` query
//! flags.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};

use recsync::query::FindParams;
use recsync::remote::{next_subscription_id, RemoteEventCallback, RemotePage, RemoteTopic, SubscriptionId};
use recsync::{Record, RemoteError, RemoteService};

#[derive(Default)]
pub struct FakeRemoteService {
    records: Mutex<Vec<Record>>,
    next_id: Mutex<i64>,
    subscribers: Mutex<HashMap<SubscriptionId, (RemoteTopic, RemoteEventCallback)>>,
}

impl FakeRemoteService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    pub fn seed(&self, records: Vec<Record>) {
        let mut max_id = *self.next_id.lock();
        for r in &records {
            if let Some(id) = r.id().and_then(Value::as_i64) {
                max_id = max_id.max(id + 1);
            }
        }
        *self.next_id.lock() = max_id;
        *self.records.lock() = records;
    }

    pub fn all(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    fn next_server_id(&self) -> Value {
        let mut next = self.next_id.lock();
        let id = *next;
        *next += 1;
        json!(id)
    }

    fn notify(&self, topic: RemoteTopic, record: Record) {
        for (subscribed_topic, callback) in self.subscribers.lock().values() {
            if *subscribed_topic == topic {
                callback(record.clone());
            }
        }
    }

    async fn maybe_inject_failure(&self, params: &FindParams) -> Result<(), RemoteError> {
        let flags = params.query.as_object();
        let should_timeout = flags
            .and_then(|o| o.get("_timeout"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let should_fail = flags
            .and_then(|o| o.get("_fail"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if should_timeout {
            // Never resolves within any reasonable caller timeout.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if should_fail {
            return Err(RemoteError::new("injected failure"));
        }
        Ok(())
    }

    /// Simulate another client's remote-side mutation, firing the matching
    /// topic to every subscriber.
    pub fn remote_side_create(&self, mut record: Record) -> Record {
        if record.updated_at().is_none() {
            record.set_updated_at(Utc::now());
        }
        self.records.lock().push(record.clone());
        self.notify(RemoteTopic::Created, record.clone());
        record
    }

    pub fn remote_side_patch(&self, id: &Value, patch: &Record) -> Record {
        let mut records = self.records.lock();
        let pos = records.iter().position(|r| r.id() == Some(id)).expect("record exists");
        let merged = records[pos].merged_with(patch);
        let mut merged = merged;
        merged.set_updated_at(Utc::now());
        records[pos] = merged.clone();
        drop(records);
        self.notify(RemoteTopic::Patched, merged.clone());
        merged
    }
}

#[async_trait]
impl RemoteService for FakeRemoteService {
    async fn find(&self, params: &FindParams) -> Result<RemotePage, RemoteError> {
        self.maybe_inject_failure(params).await?;
        let predicate = params.predicate();
        let matched: Vec<Record> = self
            .records
            .lock()
            .iter()
            .filter(|r| recsync::query::default_matcher()(r, &predicate))
            .cloned()
            .collect();
        let total = matched.len();
        let skip = params.skip();
        let limit = params.limit().unwrap_or(total.max(1));
        let data: Vec<Record> = matched.into_iter().skip(skip).take(limit).collect();
        Ok(RemotePage {
            data,
            total,
            limit,
            skip,
        })
    }

    async fn get(&self, id: &Value, params: &FindParams) -> Result<Record, RemoteError> {
        self.maybe_inject_failure(params).await?;
        self.records
            .lock()
            .iter()
            .find(|r| r.id() == Some(id))
            .cloned()
            .ok_or_else(|| RemoteError::new("not found"))
    }

    async fn create(&self, mut data: Record, params: &FindParams) -> Result<Record, RemoteError> {
        self.maybe_inject_failure(params).await?;
        if data.id().is_none() {
            let id = self.next_server_id();
            data.set_id(id);
        }
        data.set_updated_at(Utc::now());
        self.records.lock().push(data.clone());
        self.notify(RemoteTopic::Created, data.clone());
        Ok(data)
    }

    async fn update(&self, id: &Value, mut data: Record, params: &FindParams) -> Result<Record, RemoteError> {
        self.maybe_inject_failure(params).await?;
        let mut records = self.records.lock();
        let pos = records
            .iter()
            .position(|r| r.id() == Some(id))
            .ok_or_else(|| RemoteError::new("not found"))?;
        data.set_id(id.clone());
        data.set_updated_at(Utc::now());
        records[pos] = data.clone();
        drop(records);
        self.notify(RemoteTopic::Updated, data.clone());
        Ok(data)
    }

    async fn patch(&self, id: &Value, data: Record, params: &FindParams) -> Result<Record, RemoteError> {
        self.maybe_inject_failure(params).await?;
        let mut records = self.records.lock();
        let pos = records
            .iter()
            .position(|r| r.id() == Some(id))
            .ok_or_else(|| RemoteError::new("not found"))?;
        let mut merged = records[pos].merged_with(&data);
        merged.set_updated_at(Utc::now());
        records[pos] = merged.clone();
        drop(records);
        self.notify(RemoteTopic::Patched, merged.clone());
        Ok(merged)
    }

    async fn remove(&self, id: &Value, params: &FindParams) -> Result<Record, RemoteError> {
        self.maybe_inject_failure(params).await?;
        let mut records = self.records.lock();
        let pos = records
            .iter()
            .position(|r| r.id() == Some(id))
            .ok_or_else(|| RemoteError::new("not found"))?;
        let removed = records.remove(pos);
        drop(records);
        self.notify(RemoteTopic::Removed, removed.clone());
        Ok(removed)
    }

    fn subscribe(&self, topic: RemoteTopic, callback: RemoteEventCallback) -> SubscriptionId {
        let id = next_subscription_id();
        self.subscribers.lock().insert(id, (topic, callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id);
    }
}

/// Convenience: build five seeded records (`ids 0..4`, `uuids 1000..1004`,
/// `order = id`).
pub fn seed_records() -> Vec<Record> {
    (0..5)
        .map(|i| {
            Record::new(json!({
                "id": i,
                "uuid": format!("{}", 1000 + i),
                "order": i,
                "updatedAt": Utc::now().to_rfc3339(),
            }))
        })
        .collect()
}

