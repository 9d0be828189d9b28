//! Pluggable query evaluation consumed by [`crate::mutator::Mutator::find`].
//!
//! The matcher and sort-specification evaluators are deliberately
//! pluggable; this module carries the shapes they operate over plus a
//! small default implementation, the way `IndexDefinition` carries query
//! shape as plain data next to a trait-object evaluator
//! (`less-db/src/storage/memory_mapped.rs::check_unique`).

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::record::Record;

/// Query parameters passed to `find`/`get`/`create`/etc. `query` carries
/// both domain predicate fields and the reserved `$sort`/`$skip`/`$limit`
/// keys.
#[derive(Debug, Clone, Default)]
pub struct FindParams {
    pub query: Value,
}

impl FindParams {
    pub fn new(query: Value) -> Self {
        Self { query }
    }

    fn as_object(&self) -> Option<&Map<String, Value>> {
        self.query.as_object()
    }

    /// The `$sort` clause, if present: `{field: +1|-1, ...}`.
    pub fn sort_spec(&self) -> Option<Vec<(String, i64)>> {
        let obj = self.as_object()?.get("$sort")?.as_object()?;
        Some(
            obj.iter()
                .map(|(k, v)| (k.clone(), v.as_i64().unwrap_or(1)))
                .collect(),
        )
    }

    pub fn skip(&self) -> usize {
        self.as_object()
            .and_then(|o| o.get("$skip"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }

    pub fn limit(&self) -> Option<usize> {
        self.as_object()
            .and_then(|o| o.get("$limit"))
            .and_then(Value::as_u64)
            .map(|v| v as usize)
    }

    /// The predicate fields, i.e. `query` with `$`-prefixed keys removed.
    pub fn predicate(&self) -> Value {
        match self.as_object() {
            Some(obj) => Value::Object(
                obj.iter()
                    .filter(|(k, _)| !k.starts_with('$'))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            None => Value::Object(Map::new()),
        }
    }
}

/// Evaluates whether a record satisfies a predicate object.
pub type Matcher = Arc<dyn Fn(&Record, &Value) -> bool + Send + Sync>;

/// Orders records in place according to a `$sort` clause.
pub type Sorter = Arc<dyn Fn(&mut [Record], &[(String, i64)]) + Send + Sync>;

/// Pagination configuration, mirroring Feathers-style `paginate: {default,
/// max}` config carried through by the Mutator.
#[derive(Debug, Clone, Default)]
pub struct PaginateConfig {
    pub default: Option<usize>,
    pub max: Option<usize>,
}

/// Paginated envelope returned by `find` when pagination is active.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub total: usize,
    pub limit: usize,
    pub skip: usize,
    pub data: Vec<T>,
}

/// Result of `find`: either a bare array or a paginated envelope,
/// depending on `paginate.default`.
#[derive(Debug, Clone)]
pub enum FindResult {
    Bare(Vec<Record>),
    Paginated(Page<Record>),
}

/// Default equality/comparison matcher: every predicate field must equal
/// the record's field value exactly. Operators beyond equality are left
/// to a caller-supplied [`Matcher`].
pub fn default_matcher() -> Matcher {
    Arc::new(|record: &Record, predicate: &Value| {
        let Some(obj) = predicate.as_object() else {
            return true;
        };
        obj.iter().all(|(field, expected)| match expected {
            Value::Object(ops) => ops.iter().all(|(op, operand)| {
                apply_operator(record.get(field), op, operand)
            }),
            _ => record.get(field) == Some(expected),
        })
    })
}

fn apply_operator(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    let cmp = |ord: Ordering| {
        actual
            .and_then(|a| compare_values(a, operand))
            .map(|c| c == ord)
            .unwrap_or(false)
    };
    match op {
        "$lt" => cmp(Ordering::Less),
        "$lte" => actual
            .and_then(|a| compare_values(a, operand))
            .map(|c| c != Ordering::Greater)
            .unwrap_or(false),
        "$gt" => cmp(Ordering::Greater),
        "$gte" => actual
            .and_then(|a| compare_values(a, operand))
            .map(|c| c != Ordering::Less)
            .unwrap_or(false),
        "$ne" => actual != Some(operand),
        "$in" => operand
            .as_array()
            .map(|arr| actual.map(|a| arr.contains(a)).unwrap_or(false))
            .unwrap_or(false),
        "$nin" => operand
            .as_array()
            .map(|arr| actual.map(|a| !arr.contains(a)).unwrap_or(true))
            .unwrap_or(true),
        _ => false,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Default sorter: applies an ordered list of (field, direction) pairs,
/// stable on ties — same contract as [`crate::sort::multi_sort`].
pub fn default_sorter() -> Sorter {
    Arc::new(|records: &mut [Record], spec: &[(String, i64)]| {
        records.sort_by(|a, b| {
            for (field, dir) in spec {
                let ord = compare_field(a, b, field);
                if ord != Ordering::Equal {
                    return if *dir < 0 { ord.reverse() } else { ord };
                }
            }
            Ordering::Equal
        });
    })
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_matcher_supports_lt() {
        let matcher = default_matcher();
        let r = Record::new(json!({"order": 3}));
        assert!(matcher(&r, &json!({"order": {"$lt": 5}})));
        assert!(!matcher(&r, &json!({"order": {"$lt": 2}})));
    }

    #[test]
    fn default_sorter_orders_by_field_descending() {
        let sorter = default_sorter();
        let mut records = vec![
            Record::new(json!({"order": 1})),
            Record::new(json!({"order": 3})),
            Record::new(json!({"order": 2})),
        ];
        sorter(&mut records, &[("order".to_string(), -1)]);
        let orders: Vec<_> = records.iter().map(|r| r.get("order").cloned()).collect();
        assert_eq!(orders, vec![Some(json!(3)), Some(json!(2)), Some(json!(1))]);
    }
}
