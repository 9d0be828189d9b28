//! The Mutator: the standard CRUD surface application code drives,
//! backed by optimistic replication through the Engine and Replicator.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::events::{EventSource, MutationKind};
use crate::query::{default_matcher, default_sorter, FindParams, FindResult, Matcher, Page, PaginateConfig, Sorter};
use crate::record::Record;
use crate::remote::RemoteService;
use crate::replicator::Replicator;
use crate::timeout::{call_with_timeout, RemoteOutcome};

/// Either a single result or, for `id: null` fan-out calls, one result per
/// matched record.
#[derive(Debug, Clone)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

pub struct MutatorOptions {
    /// Per-remote-call time limit. Implementation-defined default in the
    /// 500-2500ms range; 2000ms here.
    pub timeout: Duration,
    pub paginate: PaginateConfig,
    pub matcher: Matcher,
    pub sorter: Sorter,
    /// Local primary-key field name, carried through to the query layer.
    pub id_field: String,
}

impl Default for MutatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            paginate: PaginateConfig::default(),
            matcher: default_matcher(),
            sorter: default_sorter(),
            id_field: "id".to_string(),
        }
    }
}

pub struct Mutator<R: RemoteService> {
    replicator: Arc<Replicator<R>>,
    options: MutatorOptions,
}

impl<R: RemoteService + 'static> Mutator<R> {
    /// Fails construction unless the bound Engine has `use_uuid = true`
    /// and `use_updated_at = true`.
    pub fn new(replicator: Arc<Replicator<R>>, options: MutatorOptions) -> Result<Self> {
        if !replicator.engine().use_uuid || !replicator.engine().use_updated_at {
            return Err(Error::bad_request(
                "Mutator requires a Replicator whose Engine has use_uuid and use_updated_at enabled",
            ));
        }
        Ok(Self {
            replicator,
            options,
        })
    }

    /// The bound Engine, for inspecting local state (record/queue counts,
    /// direct lookups) alongside the CRUD surface above.
    pub fn engine(&self) -> &Arc<crate::engine::Engine> {
        self.replicator.engine()
    }

    /// Read-only: filter, sort, skip/limit. Never mutates or enqueues.
    pub fn find(&self, params: &FindParams) -> FindResult {
        let predicate = params.predicate();
        let mut matched: Vec<Record> = self
            .engine()
            .records()
            .into_iter()
            .filter(|r| (self.options.matcher)(r, &predicate))
            .collect();

        if let Some(sort_spec) = params.sort_spec() {
            (self.options.sorter)(matched.as_mut_slice(), &sort_spec);
        }

        let total = matched.len();
        let skip = params.skip();
        let limit = params
            .limit()
            .or(self.options.paginate.default)
            .map(|l| match self.options.paginate.max {
                Some(max) => l.min(max),
                None => l,
            });

        let page: Vec<Record> = match limit {
            Some(limit) => matched.into_iter().skip(skip).take(limit).collect(),
            None => matched.into_iter().skip(skip).collect(),
        };

        match self.options.paginate.default {
            Some(default_limit) => FindResult::Paginated(Page {
                total,
                limit: limit.unwrap_or(default_limit),
                skip,
                data: page,
            }),
            None => FindResult::Bare(page),
        }
    }

    /// Lookup by `uuid` — the only identifier guaranteed present before
    /// server confirmation.
    pub fn get(&self, uuid: &str) -> Result<Record> {
        self.engine().find_by_uuid(uuid).ok_or(Error::NotFound)
    }

    fn project(&self, record: Record, params: &FindParams) -> Record {
        let Some(select) = select_fields(params) else {
            return record;
        };
        let Some(obj) = record.as_object() else {
            return record;
        };
        let mut projected = serde_json::Map::new();
        for field in &select {
            if let Some(v) = obj.get(field) {
                projected.insert(field.clone(), v.clone());
            }
        }
        for keep in ["id", "_id", "uuid"] {
            if let Some(v) = obj.get(keep) {
                projected.insert(keep.to_string(), v.clone());
            }
        }
        Record::new(Value::Object(projected))
    }

    /// Single-record create. For array input, use [`Mutator::create_many`].
    pub async fn create(&self, mut data: Record, params: &FindParams) -> Result<Record> {
        if !self.replicator.is_connected() {
            return Err(Error::bad_request("Replicator not connected"));
        }

        if data.uuid().is_none() {
            data.set_uuid(self.replicator.get_uuid());
        }
        let uuid = data.uuid().expect("just assigned if missing").to_string();

        if self.engine().find_by_uuid(&uuid).is_some() {
            return Err(Error::bad_request("unique uuid"));
        }

        let fallback = data.clone();
        let applied = self
            .engine()
            .mutate_store(MutationKind::Create, data, EventSource::Local)
            .into_record()
            .unwrap_or(fallback);

        self.engine()
            .add_queued_net_event(MutationKind::Create, applied.clone(), vec![params.query.clone()])?;

        self.replay_async(MutationKind::Create, applied.clone(), params.clone());

        Ok(self.project(applied, params))
    }

    /// Apply `create` to each element in order, returning one result per
    /// input.
    pub async fn create_many(&self, data: Vec<Record>, params: &FindParams) -> Result<Vec<Record>> {
        let mut results = Vec::with_capacity(data.len());
        for item in data {
            results.push(self.create(item, params).await?);
        }
        Ok(results)
    }

    /// Require `data.uuid`; locate by server `id`; preserve the existing
    /// `uuid` onto `data`.
    pub async fn update(&self, id: &Value, mut data: Record, params: &FindParams) -> Result<Record> {
        if data.uuid().is_none() {
            return Err(Error::bad_request("update requires data.uuid"));
        }

        let existing = self.engine().find_by_id(id).ok_or(Error::NotFound)?;
        let existing_uuid = existing.uuid().ok_or(Error::NotFound)?.to_string();
        data.set_uuid(existing_uuid);
        data.set_id(id.clone());

        let fallback = data.clone();
        let applied = self
            .engine()
            .mutate_store(MutationKind::Update, data, EventSource::Local)
            .into_record()
            .unwrap_or(fallback);

        self.engine()
            .add_queued_net_event(MutationKind::Update, applied.clone(), vec![params.query.clone()])?;

        self.replay_async(MutationKind::Update, applied.clone(), params.clone());

        Ok(self.project(applied, params))
    }

    /// Merge `data` over the existing record. With `id = None`, fans out
    /// across `find(params)`.
    pub async fn patch(
        &self,
        id: Option<Value>,
        data: Record,
        params: &FindParams,
    ) -> Result<OneOrMany<Record>> {
        let Some(id) = id else {
            let targets = match self.find(params) {
                FindResult::Bare(records) => records,
                FindResult::Paginated(page) => page.data,
            };
            let mut results = Vec::with_capacity(targets.len());
            for target in targets {
                let target_id = target.id().cloned().ok_or(Error::NotFound)?;
                results.push(self.patch_one(&target_id, &data, params).await?);
            }
            return Ok(OneOrMany::Many(results));
        };
        Ok(OneOrMany::One(self.patch_one(&id, &data, params).await?))
    }

    async fn patch_one(&self, id: &Value, data: &Record, params: &FindParams) -> Result<Record> {
        let existing = self.engine().find_by_id(id).ok_or(Error::NotFound)?;
        let merged = existing.merged_with(data);

        let fallback = merged.clone();
        let applied = self
            .engine()
            .mutate_store(MutationKind::Patch, merged, EventSource::Local)
            .into_record()
            .unwrap_or(fallback);

        self.engine()
            .add_queued_net_event(MutationKind::Patch, applied.clone(), vec![params.query.clone()])?;

        self.replay_async(MutationKind::Patch, applied.clone(), params.clone());

        Ok(self.project(applied, params))
    }

    /// Remove by server `id`. With `id = None`, fans out across
    /// `find(params)`.
    pub async fn remove(&self, id: Option<Value>, params: &FindParams) -> Result<OneOrMany<Record>> {
        let Some(id) = id else {
            let targets = match self.find(params) {
                FindResult::Bare(records) => records,
                FindResult::Paginated(page) => page.data,
            };
            let mut results = Vec::with_capacity(targets.len());
            for target in targets {
                let target_id = target.id().cloned().ok_or(Error::NotFound)?;
                results.push(self.remove_one(&target_id, params).await?);
            }
            return Ok(OneOrMany::Many(results));
        };
        Ok(OneOrMany::One(self.remove_one(&id, params).await?))
    }

    async fn remove_one(&self, id: &Value, params: &FindParams) -> Result<Record> {
        let snapshot = self.engine().find_by_id(id).ok_or(Error::NotFound)?;

        let removed = self
            .engine()
            .mutate_store(MutationKind::Remove, snapshot.clone(), EventSource::Local)
            .into_record()
            .unwrap_or(snapshot);

        self.engine().add_queued_net_event(
            MutationKind::Remove,
            removed.clone(),
            vec![params.query.clone()],
        )?;

        self.replay_async(MutationKind::Remove, removed.clone(), params.clone());

        Ok(self.project(removed, params))
    }

    /// Invoke the remote call under the configured time limit; on success
    /// dequeue, on timeout/error leave the entry queued for the next
    /// `connect` replay. Fire-and-forget from the caller's perspective —
    /// the optimistic result has already been returned.
    fn replay_async(&self, kind: MutationKind, record: Record, params: FindParams) {
        let remote = Arc::clone(self.replicator.remote());
        let engine = Arc::clone(self.engine());
        let timeout = self.options.timeout;

        tokio::spawn(async move {
            let args = params.query.clone();
            let id = record.id().cloned().unwrap_or(Value::Null);
            let outcome = match kind {
                MutationKind::Create => {
                    call_with_timeout(remote.create(record.clone(), &params), timeout, args).await
                }
                MutationKind::Update => {
                    call_with_timeout(remote.update(&id, record.clone(), &params), timeout, args).await
                }
                MutationKind::Patch => {
                    call_with_timeout(remote.patch(&id, record.clone(), &params), timeout, args).await
                }
                MutationKind::Remove => {
                    call_with_timeout(remote.remove(&id, &params), timeout, args).await
                }
            };

            match outcome {
                RemoteOutcome::Success(response) => {
                    engine.remove_queued_event(kind, &record, response.updated_at());
                }
                RemoteOutcome::Failure(e) => {
                    tracing::debug!(error = %e, ?kind, "remote call failed, entry stays queued for replay");
                }
                RemoteOutcome::TimedOut { limit, .. } => {
                    tracing::debug!(?limit, ?kind, "remote call timed out, entry stays queued for replay");
                }
            }
        });
    }
}

fn select_fields(params: &FindParams) -> Option<Vec<String>> {
    let obj = params.query.as_object()?;
    let select = obj.get("$select")?.as_array()?;
    Some(
        select
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    )
}
