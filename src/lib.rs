//! `recsync` — an offline-capable, optimistic-replication client for a
//! remote record-oriented service.
//!
//! Three components, leaves first: [`engine::Engine`] owns the local
//! record array, the mutation queue, and the publication-filtered event
//! stream; [`replicator::Replicator`] binds an Engine to a
//! [`remote::RemoteService`] and drives the snapshot/reconnect lifecycle;
//! [`mutator::Mutator`] exposes the CRUD surface application code drives,
//! performing optimistic local mutation ahead of remote confirmation.
//!
//! The remote service's own storage/query engine, its predicate and sort
//! evaluators, UUID generation for other clients, transport, and
//! authentication are all consumed as pluggable interfaces (see
//! [`remote::RemoteService`], [`query`]) rather than implemented here.

pub mod engine;
pub mod error;
pub mod events;
pub mod mutator;
pub mod query;
pub mod record;
pub mod remote;
pub mod replicator;
pub mod sort;
pub mod store;
pub mod timeout;
pub mod uuid_gen;

pub use engine::{Engine, EngineOptions, MutateOutcome};
pub use error::{Error, RemoteError, Result};
pub use events::{ChangeEvent, EventAction, EventSource, MutationKind};
pub use mutator::{Mutator, MutatorOptions, OneOrMany};
pub use query::{FindParams, FindResult, PaginateConfig};
pub use record::Record;
pub use remote::{next_subscription_id, RemotePage, RemoteService, RemoteTopic};
pub use replicator::{Replicator, ReplicatorOptions};
