//! The `Record` data type: an opaque JSON document carrying at least a
//! server id, a client-minted `uuid`, and an `updatedAt` timestamp.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// An opaque document mirrored between the local store and the remote
/// service. Domain fields beyond `id`/`_id`/`uuid`/`updatedAt` pass
/// through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Value);

impl Record {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    fn as_object_mut(&mut self) -> &mut Map<String, Value> {
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }
        self.0.as_object_mut().expect("just coerced to object")
    }

    /// Server identifier: `id` if present, else `_id`.
    pub fn id(&self) -> Option<&Value> {
        let obj = self.as_object()?;
        obj.get("id")
            .filter(|v| !v.is_null())
            .or_else(|| obj.get("_id").filter(|v| !v.is_null()))
    }

    pub fn set_id(&mut self, id: Value) {
        self.as_object_mut().insert("id".to_string(), id);
    }

    /// Client-minted stable identifier, assigned before server confirmation.
    pub fn uuid(&self) -> Option<&str> {
        self.as_object()?.get("uuid")?.as_str()
    }

    pub fn set_uuid(&mut self, uuid: impl Into<String>) {
        self.as_object_mut()
            .insert("uuid".to_string(), Value::String(uuid.into()));
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.as_object()?.get("updatedAt")?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_updated_at(&mut self, ts: DateTime<Utc>) {
        self.as_object_mut().insert(
            "updatedAt".to_string(),
            Value::String(ts.to_rfc3339()),
        );
    }

    /// Look up an arbitrary field, used by matchers/sorters/publication
    /// predicates evaluating against domain fields.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object()?.get(field)
    }

    /// Shallow merge `patch` over this record's fields (used by `patch`).
    pub fn merged_with(&self, patch: &Record) -> Record {
        let mut base = self.as_object().cloned().unwrap_or_default();
        if let Some(patch_obj) = patch.as_object() {
            for (k, v) in patch_obj {
                base.insert(k.clone(), v.clone());
            }
        }
        Record(Value::Object(base))
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.0
    }
}
