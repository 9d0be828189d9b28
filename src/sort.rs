//! Sort factories producing the comparator the Engine uses to keep
//! `records` ordered.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::record::Record;

/// Comparator over two records, installed on the Engine via
/// [`crate::engine::Engine::change_sort`].
pub type SortFn = Arc<dyn Fn(&Record, &Record) -> Ordering + Send + Sync>;

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Comparator over a single field, ascending.
pub fn sort(field: impl Into<String>) -> SortFn {
    let field = field.into();
    Arc::new(move |a: &Record, b: &Record| compare(a.get(&field), b.get(&field)))
}

/// Comparator over an ordered list of `(field, direction)` pairs, `+1` for
/// ascending and `-1` for descending; stable on ties across all fields.
pub fn multi_sort(fields: Vec<(String, i32)>) -> SortFn {
    Arc::new(move |a: &Record, b: &Record| {
        for (field, dir) in &fields {
            let ord = compare(a.get(field), b.get(field));
            if ord != Ordering::Equal {
                return if *dir < 0 { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_orders_ascending_by_field() {
        let cmp = sort("order");
        let a = Record::new(json!({"order": 1}));
        let b = Record::new(json!({"order": 2}));
        assert_eq!(cmp(&a, &b), Ordering::Less);
    }

    #[test]
    fn multi_sort_breaks_ties_with_second_field() {
        let cmp = multi_sort(vec![("group".to_string(), 1), ("order".to_string(), -1)]);
        let a = Record::new(json!({"group": 1, "order": 1}));
        let b = Record::new(json!({"group": 1, "order": 2}));
        assert_eq!(cmp(&a, &b), Ordering::Greater);
    }
}
