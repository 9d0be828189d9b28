//! The local `Store`: the record array, the pending mutation queue, the
//! `syncedAt` watermark, and the last-emitted event descriptor. Owned
//! exclusively by the [`crate::engine::Engine`].

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::events::{ChangeEvent, MutationKind};
use crate::record::Record;

/// A queued mutation awaiting remote confirmation.
#[derive(Debug, Clone)]
pub struct QueuedMutation {
    pub event_name: MutationKind,
    pub record: Record,
    /// Exactly what must be replayed to the remote service.
    pub args: Vec<Value>,
}

impl QueuedMutation {
    pub fn uuid(&self) -> Option<&str> {
        self.record.uuid()
    }
}

/// The fixed epoch `syncedAt` is initialized to.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()
}

/// Process-local mirror of the remote collection.
#[derive(Debug)]
pub struct Store {
    pub records: Vec<Record>,
    pub queued: Vec<QueuedMutation>,
    pub synced_at: DateTime<Utc>,
    pub last: Option<ChangeEvent>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            queued: Vec::new(),
            synced_at: epoch(),
            last: None,
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server id lookup — `id` if present, else `_id`.
    pub fn position_by_id(&self, id: &Value) -> Option<usize> {
        self.records.iter().position(|r| r.id() == Some(id))
    }

    pub fn position_by_uuid(&self, uuid: &str) -> Option<usize> {
        self.records.iter().position(|r| r.uuid() == Some(uuid))
    }

    /// Advance `syncedAt`, never letting it decrease.
    pub fn advance_synced_at(&mut self, candidate: DateTime<Utc>) {
        if candidate > self.synced_at {
            self.synced_at = candidate;
        }
    }
}
