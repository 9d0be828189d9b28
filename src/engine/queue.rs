//! Queue operations: enqueue with coalescing, dequeue on confirmation,
//! and head-to-tail replay against the remote service.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::events::{EventSource, MutationKind};
use crate::query::FindParams;
use crate::record::Record;
use crate::remote::RemoteService;
use crate::store::QueuedMutation;

use super::Engine;

impl Engine {
    /// Append to `queued` unconditionally.
    pub fn add_queued_event(&self, event_name: MutationKind, record: Record, args: Vec<Value>) {
        self.with_store_mut(|store| {
            store.queued.push(QueuedMutation {
                event_name,
                record,
                args,
            });
        });
        self.persist_queue();
    }

    /// Append with net-change coalescing.
    ///
    /// If a prior queued entry for the same `uuid` exists and was not a
    /// `remove`, it is overwritten in place. If it *was* a `remove`, only a
    /// following `create` may be appended after it — anything else is a
    /// coalescing violation (`remove` followed by non-`create` is
    /// impossible) and fails with [`Error::BadRequest`].
    pub fn add_queued_net_event(
        &self,
        event_name: MutationKind,
        record: Record,
        args: Vec<Value>,
    ) -> Result<()> {
        let uuid = record.uuid().map(|s| s.to_string());

        self.with_store_mut(|store| -> Result<()> {
            let prior_pos = uuid
                .as_deref()
                .and_then(|uuid| store.queued.iter().rposition(|q| q.uuid() == Some(uuid)));

            match prior_pos {
                Some(pos) if store.queued[pos].event_name != MutationKind::Remove => {
                    store.queued[pos] = QueuedMutation {
                        event_name,
                        record,
                        args,
                    };
                }
                Some(pos) if event_name == MutationKind::Create => {
                    store.queued.insert(
                        pos + 1,
                        QueuedMutation {
                            event_name,
                            record,
                            args,
                        },
                    );
                }
                Some(_) => {
                    return Err(Error::bad_request(
                        "cannot queue a mutation after a pending remove except create",
                    ));
                }
                None => {
                    store.queued.push(QueuedMutation {
                        event_name,
                        record,
                        args,
                    });
                }
            }
            Ok(())
        })?;

        self.persist_queue();
        Ok(())
    }

    /// Remove the most recent `(uuid, eventName)` match, scanning from the
    /// newest end backward, and advance `syncedAt` if `updated_at` is
    /// given. Invoked after a successful remote confirmation.
    pub fn remove_queued_event(
        &self,
        event_name: MutationKind,
        record: &Record,
        updated_at: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        let uuid = record.uuid().map(|s| s.to_string());
        self.with_store_mut(|store| {
            if let Some(pos) = store
                .queued
                .iter()
                .rposition(|q| q.uuid().map(|s| s.to_string()) == uuid && q.event_name == event_name)
            {
                store.queued.remove(pos);
            }
            if let Some(ts) = updated_at {
                store.advance_synced_at(ts);
            }
        });
        self.persist_queue();
    }

    /// Drain `queued` head-first, invoking `remote` for each entry. On any
    /// failure, the failing entry is pushed back onto the head and replay
    /// stops.
    pub async fn process_queued_events(&self, remote: &dyn RemoteService) -> Result<()> {
        loop {
            let entry = self.with_store_mut(|store| {
                if store.queued.is_empty() {
                    None
                } else {
                    Some(store.queued.remove(0))
                }
            });
            let Some(entry) = entry else {
                return Ok(());
            };

            let params = FindParams::new(entry.args.first().cloned().unwrap_or(Value::Null));
            let id = entry.record.id().cloned().unwrap_or(Value::Null);

            let outcome = match entry.event_name {
                MutationKind::Create => remote.create(entry.record.clone(), &params).await,
                MutationKind::Update => remote.update(&id, entry.record.clone(), &params).await,
                MutationKind::Patch => remote.patch(&id, entry.record.clone(), &params).await,
                MutationKind::Remove => remote.remove(&id, &params).await,
            };

            match outcome {
                Ok(response) => {
                    let confirmed_at = response.updated_at().unwrap_or_else(chrono::Utc::now);
                    self.mutate_store(entry.event_name, response, EventSource::Remote);
                    self.advance_synced_at(confirmed_at);
                }
                Err(e) => {
                    tracing::warn!(error = %e, event = ?entry.event_name, "queue replay failed, halting");
                    self.with_store_mut(|store| store.queued.insert(0, entry));
                    self.persist_queue();
                    return Err(e.into());
                }
            }
        }
    }
}
