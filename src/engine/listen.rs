//! Listener state machine: `idle → listening → idle`, transitioned by
//! `add_listeners`/`remove_listeners`.

use std::sync::Arc;

use crate::events::{EventAction, EventSource, MutationKind};
use crate::remote::{RemoteService, RemoteTopic, SubscriptionId};

use super::Engine;

#[derive(Debug, Default)]
pub enum ListenState {
    #[default]
    Idle,
    Listening {
        subscriptions: Vec<SubscriptionId>,
    },
}

const TOPICS: [(RemoteTopic, MutationKind); 4] = [
    (RemoteTopic::Created, MutationKind::Create),
    (RemoteTopic::Updated, MutationKind::Update),
    (RemoteTopic::Patched, MutationKind::Patch),
    (RemoteTopic::Removed, MutationKind::Remove),
];

impl Engine {
    /// Subscribe to the remote service's four change topics. Each remote
    /// event invokes `mutate_store(eventName, record, Remote)`.
    pub fn add_listeners(self: &Arc<Self>, remote: &dyn RemoteService) {
        let mut subscriptions = Vec::with_capacity(TOPICS.len());
        for (topic, kind) in TOPICS {
            let engine = Arc::clone(self);
            let id = remote.subscribe(
                topic,
                Arc::new(move |record| {
                    engine.mutate_store(kind, record, EventSource::Remote);
                }),
            );
            subscriptions.push(id);
        }

        *self.listening_state().lock() = ListenState::Listening { subscriptions };

        self.with_store_mut(|store| {
            self.emit(
                store,
                crate::events::ChangeEvent {
                    source: EventSource::Local,
                    action: EventAction::AddListeners,
                    event_name: None,
                    record: None,
                },
            );
        });
    }

    /// Detach all listeners, returning to the `idle` state.
    pub fn remove_listeners(&self, remote: &dyn RemoteService) {
        let subscriptions = {
            let mut state = self.listening_state().lock();
            match std::mem::take(&mut *state) {
                ListenState::Listening { subscriptions } => subscriptions,
                ListenState::Idle => Vec::new(),
            }
        };
        for id in subscriptions {
            remote.unsubscribe(id);
        }

        self.with_store_mut(|store| {
            self.emit(
                store,
                crate::events::ChangeEvent {
                    source: EventSource::Local,
                    action: EventAction::RemoveListeners,
                    event_name: None,
                    record: None,
                },
            );
        });
    }
}
