//! The Replicator: binds the Engine to one remote service instance and
//! owns the connect/reconnect lifecycle.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::Result;
use crate::query::FindParams;
use crate::record::Record;
use crate::remote::RemoteService;
use crate::sort::{multi_sort, sort, SortFn};
use crate::uuid_gen::{self, UuidStyle};

#[derive(Debug, Clone)]
pub struct ReplicatorOptions {
    /// Base query merged into every snapshot fetch.
    pub base_query: Value,
    /// Whether to add an `updatedAt >= syncedAt` clause to the snapshot
    /// query. Must be `true` for a `Mutator` to bind through this
    /// `Replicator`.
    pub use_updated_at: bool,
    /// Whether the remote `find` is paginated and must be drained in a
    /// loop until exhausted.
    pub paginate: bool,
    pub uuid_style: UuidStyle,
}

impl Default for ReplicatorOptions {
    fn default() -> Self {
        Self {
            base_query: Value::Object(Map::new()),
            use_updated_at: true,
            paginate: true,
            uuid_style: UuidStyle::default(),
        }
    }
}

pub struct Replicator<R: RemoteService> {
    engine: Arc<Engine>,
    remote: Arc<R>,
    options: ReplicatorOptions,
}

impl<R: RemoteService + 'static> Replicator<R> {
    pub fn new(engine: Arc<Engine>, remote: Arc<R>, options: ReplicatorOptions) -> Arc<Self> {
        Arc::new(Self {
            engine,
            remote,
            options,
        })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn is_connected(&self) -> bool {
        self.engine.is_listening()
    }

    /// Detach listeners, build the snapshot query, fetch until exhausted,
    /// filter by publication, hand the result to `Engine::snapshot`
    /// (sorting happens there), replay the queue non-fatally, then
    /// reattach listeners.
    pub async fn connect(self: &Arc<Self>, extra_query: Option<Value>) -> Result<()> {
        self.engine.remove_listeners(self.remote.as_ref());

        let query = self.build_snapshot_query(extra_query);
        let params = FindParams::new(query);

        let fetched = self
            .fetch_all(&params)
            .await
            .map_err(|e| crate::error::Error::Remote(e.to_string()))?;

        let filtered = match self.engine.publication_predicate() {
            Some(predicate) => fetched.into_iter().filter(|r| predicate(r)).collect(),
            None => fetched,
        };

        self.engine.snapshot(filtered);

        if let Err(e) = self.engine.process_queued_events(self.remote.as_ref()).await {
            tracing::warn!(error = %e, "queue replay during connect failed, will retry on next connect");
        }

        self.engine.add_listeners(self.remote.as_ref());

        Ok(())
    }

    /// Detach listeners. The local store is retained; queued mutations
    /// remain pending.
    pub fn disconnect(&self) {
        self.engine.remove_listeners(self.remote.as_ref());
    }

    /// Mint a new client-stable identifier.
    pub fn get_uuid(&self) -> String {
        uuid_gen::mint(self.options.uuid_style)
    }

    /// Comparator over one field, ascending.
    pub fn sort(field: impl Into<String>) -> SortFn {
        sort(field)
    }

    /// Comparator over an ordered list of `(field, direction)` pairs.
    pub fn multi_sort(fields: Vec<(String, i32)>) -> SortFn {
        multi_sort(fields)
    }

    fn build_snapshot_query(&self, extra_query: Option<Value>) -> Value {
        let mut merged = self
            .options
            .base_query
            .as_object()
            .cloned()
            .unwrap_or_default();

        if let Some(Value::Object(extra)) = extra_query {
            for (k, v) in extra {
                merged.insert(k, v);
            }
        }

        if self.options.use_updated_at {
            merged.insert(
                "updatedAt".to_string(),
                serde_json::json!({ "$gte": self.engine.synced_at().to_rfc3339() }),
            );
        }

        Value::Object(merged)
    }

    async fn fetch_all(&self, params: &FindParams) -> std::result::Result<Vec<Record>, crate::error::RemoteError> {
        if !self.options.paginate {
            return Ok(self.remote.find(params).await?.data);
        }

        let mut collected = Vec::new();
        let mut skip = params.skip();
        loop {
            let page_query = with_skip(&params.query, skip);
            let page = self.remote.find(&FindParams::new(page_query)).await?;
            let got = page.data.len();
            collected.extend(page.data);
            if got == 0 || collected.len() >= page.total {
                break;
            }
            skip += got;
        }
        Ok(collected)
    }
}

fn with_skip(query: &Value, skip: usize) -> Value {
    let mut obj = query.as_object().cloned().unwrap_or_default();
    obj.insert("$skip".to_string(), Value::from(skip as u64));
    Value::Object(obj)
}
