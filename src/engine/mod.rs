//! The Engine: single source of truth for the local view. Serializes all
//! mutations of `records` and `queued`.

mod listen;
mod queue;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::events::{ChangeEvent, EventAction, EventEmitter, EventSource, Listener, ListenerId, MutationKind};
use crate::record::Record;
use crate::sort::SortFn;
use crate::store::{epoch, QueuedMutation, Store};

pub use listen::ListenState;

/// Evaluates whether a record belongs to this client's publication.
pub type Publication = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Clock hook for `updatedAt` stamping on local apply: defaults to
/// `chrono::Utc::now`, overridable for tests and for clients that prefer
/// server time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Durable queue persistence extension point. Not required; the default
/// Engine keeps `queued` in-memory only.
pub trait QueuePersistence: Send + Sync {
    fn load(&self) -> Vec<QueuedMutation>;
    fn save(&self, queued: &[QueuedMutation]);
}

/// The outcome of [`Engine::mutate_store`]: the record's prior form, its
/// newly-applied form, or nothing at all.
#[derive(Debug, Clone)]
pub enum MutateOutcome {
    Prior(Record),
    Applied(Record),
    None,
}

impl MutateOutcome {
    pub fn into_record(self) -> Option<Record> {
        match self {
            MutateOutcome::Prior(r) | MutateOutcome::Applied(r) => Some(r),
            MutateOutcome::None => None,
        }
    }
}

#[derive(Default)]
pub struct EngineOptions {
    pub publication: Option<Publication>,
    pub sort: Option<SortFn>,
    /// Must be `true` for a `Mutator` to bind through a `Replicator`.
    pub use_uuid: bool,
    pub use_updated_at: bool,
    pub clock: Option<Clock>,
    pub persistence: Option<Arc<dyn QueuePersistence>>,
}

pub struct Engine {
    store: Mutex<Store>,
    publication: Option<Publication>,
    sort: Mutex<Option<SortFn>>,
    pub(crate) use_uuid: bool,
    pub(crate) use_updated_at: bool,
    clock: Clock,
    events: EventEmitter,
    persistence: Option<Arc<dyn QueuePersistence>>,
    listening: Mutex<ListenState>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Arc<Self> {
        let mut store = Store::new();
        if let Some(persistence) = &options.persistence {
            store.queued = persistence.load();
        }
        Arc::new(Self {
            store: Mutex::new(store),
            publication: options.publication,
            sort: Mutex::new(options.sort),
            use_uuid: options.use_uuid,
            use_updated_at: options.use_updated_at,
            clock: options.clock.unwrap_or_else(|| Arc::new(Utc::now)),
            events: EventEmitter::new(),
            persistence: options.persistence,
            listening: Mutex::new(ListenState::Idle),
        })
    }

    pub fn on(&self, listener: Listener) -> ListenerId {
        self.events.on(listener)
    }

    pub fn off(&self, id: ListenerId) {
        self.events.off(id)
    }

    pub fn set_subscriber(&self, subscriber: Option<Listener>) {
        self.events.set_subscriber(subscriber);
    }

    pub fn records(&self) -> Vec<Record> {
        self.store.lock().records.clone()
    }

    pub fn record_count(&self) -> usize {
        self.store.lock().records.len()
    }

    pub fn queued_len(&self) -> usize {
        self.store.lock().queued.len()
    }

    pub fn queued_snapshot(&self) -> Vec<QueuedMutation> {
        self.store.lock().queued.clone()
    }

    pub fn synced_at(&self) -> DateTime<Utc> {
        self.store.lock().synced_at
    }

    pub fn find_by_id(&self, id: &Value) -> Option<Record> {
        let store = self.store.lock();
        store.position_by_id(id).map(|pos| store.records[pos].clone())
    }

    pub fn find_by_uuid(&self, uuid: &str) -> Option<Record> {
        let store = self.store.lock();
        store.position_by_uuid(uuid).map(|pos| store.records[pos].clone())
    }

    /// Exposes the configured publication predicate so a `Replicator` can
    /// apply the same filter to a fresh snapshot before handing it to
    /// `snapshot`.
    pub fn publication_predicate(&self) -> Option<Publication> {
        self.publication.clone()
    }

    pub fn is_listening(&self) -> bool {
        matches!(&*self.listening.lock(), ListenState::Listening { .. })
    }

    fn passes_publication(&self, record: &Record) -> bool {
        self.publication.as_ref().map(|p| p(record)).unwrap_or(true)
    }

    fn sort_in_place(&self, store: &mut Store) {
        if let Some(sort_fn) = &*self.sort.lock() {
            store.records.sort_by(|a, b| sort_fn(a, b));
        }
    }

    fn emit(&self, store: &mut Store, event: ChangeEvent) {
        store.last = Some(event.clone());
        let snapshot = store.records.clone();
        self.events.emit(&snapshot, &event);
    }

    /// Replace the record set wholesale.
    pub fn snapshot(&self, mut records: Vec<Record>) {
        let computed = records
            .iter()
            .filter_map(|r| r.updated_at())
            .max()
            .unwrap_or_else(epoch);

        let mut store = self.store.lock();
        store.advance_synced_at(computed);
        std::mem::swap(&mut store.records, &mut records);
        self.sort_in_place(&mut store);

        self.emit(
            &mut store,
            ChangeEvent {
                source: EventSource::Remote,
                action: EventAction::Snapshot,
                event_name: None,
                record: None,
            },
        );
    }

    /// The central apply routine: locates any existing record by server
    /// id, applies the publication filter, stamps `updatedAt`, and emits
    /// the matching change event.
    pub fn mutate_store(
        &self,
        event_name: MutationKind,
        mut record: Record,
        source: EventSource,
    ) -> MutateOutcome {
        let mut store = self.store.lock();

        let before = record.id().cloned().and_then(|id| {
            store
                .position_by_id(&id)
                .map(|pos| store.records.remove(pos))
        });

        if event_name == MutationKind::Remove {
            let should_emit =
                before.is_some() || (source == EventSource::Remote && self.passes_publication(&record));
            if should_emit {
                self.emit(
                    &mut store,
                    ChangeEvent {
                        source,
                        action: EventAction::Remove,
                        event_name: Some(event_name),
                        record: Some(record),
                    },
                );
            }
            return before.map(MutateOutcome::Prior).unwrap_or(MutateOutcome::None);
        }

        if !self.passes_publication(&record) {
            if before.is_some() {
                self.emit(
                    &mut store,
                    ChangeEvent {
                        source,
                        action: EventAction::LeftPub,
                        event_name: Some(event_name),
                        record: Some(record),
                    },
                );
            }
            return MutateOutcome::None;
        }

        // `updatedAt` is overwritten with the local clock on every apply,
        // local or remote; a true server timestamp is captured by the
        // caller before this stamp (`Replicator`/queue-replay advance
        // `syncedAt` directly from the pre-stamp response).
        record.set_updated_at((self.clock)());
        store.records.push(record.clone());
        self.sort_in_place(&mut store);

        self.emit(
            &mut store,
            ChangeEvent {
                source,
                action: EventAction::Mutated,
                event_name: Some(event_name),
                record: Some(record.clone()),
            },
        );

        MutateOutcome::Applied(record)
    }

    /// Install a new sort function and re-sort in place.
    pub fn change_sort(&self, sort: SortFn) {
        let mut store = self.store.lock();
        *self.sort.lock() = Some(sort);
        self.sort_in_place(&mut store);
        self.emit(
            &mut store,
            ChangeEvent {
                source: EventSource::Local,
                action: EventAction::ChangeSort,
                event_name: None,
                record: None,
            },
        );
    }

    pub(crate) fn persist_queue(&self) {
        if let Some(persistence) = &self.persistence {
            let queued = self.store.lock().queued.clone();
            persistence.save(&queued);
        }
    }

    pub(crate) fn advance_synced_at(&self, ts: DateTime<Utc>) {
        self.store.lock().advance_synced_at(ts);
    }

    pub(crate) fn with_store_mut<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        f(&mut self.store.lock())
    }

    pub(crate) fn listening_state(&self) -> &Mutex<ListenState> {
        &self.listening
    }

    pub(crate) fn events(&self) -> &EventEmitter {
        &self.events
    }
}

/// Input query value threaded through `QueuedMutation.args` on replay.
pub fn args_from(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    values.into_iter().collect()
}
