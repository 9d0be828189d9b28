//! Application-facing event stream: a named-topic emitter plus a direct
//! subscriber callback, modeled as `Arc<dyn Fn>` registries the same way
//! `SyncManagerOptions.on_error`/`on_progress` are wired upstream
//! (`src/sync/types.rs`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::record::Record;

/// Which side produced a mutation: remote-origin or local optimistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Remote = 0,
    Local = 1,
}

/// The CRUD verb driving a mutation, shared by queued entries, remote
/// listener topics, and `mutateStore`'s `eventName` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Patch,
    Remove,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Patch => "patch",
            MutationKind::Remove => "remove",
        }
    }
}

/// Action reported on every emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Snapshot,
    AddListeners,
    RemoveListeners,
    ChangeSort,
    Mutated,
    Remove,
    LeftPub,
}

/// Descriptor of the most recent emitted event, held as `Store.last`.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub source: EventSource,
    pub action: EventAction,
    pub event_name: Option<MutationKind>,
    pub record: Option<Record>,
}

pub type Listener = Arc<dyn Fn(&[Record], &ChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Single-topic (`"events"`) publish/subscribe emitter plus one direct
/// `subscriber(records, last)` slot.
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    subscriber: Mutex<Option<Listener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }

    pub fn set_subscriber(&self, subscriber: Option<Listener>) {
        *self.subscriber.lock() = subscriber;
    }

    /// Fan out synchronously relative to the mutation that caused it.
    pub fn emit(&self, records: &[Record], last: &ChangeEvent) {
        for (_, listener) in self.listeners.lock().iter() {
            listener(records, last);
        }
        if let Some(subscriber) = self.subscriber.lock().as_ref() {
            subscriber(records, last);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listener_count", &self.listeners.lock().len())
            .field("has_subscriber", &self.subscriber.lock().is_some())
            .finish()
    }
}
