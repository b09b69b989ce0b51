//! Recursive, type-aware merge of same-typed transfers.
//!
//! The merge rule per key is an exhaustive match over [`serde_json::Value`]:
//! numbers sum, arrays concatenate, objects recurse, and anything else takes
//! the incoming value (last-write-wins over the supplied order).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Number, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::AggregationEngine;
use crate::level::Level;
use crate::message::{meta, DataTransfer};

impl AggregationEngine {
    /// Merge same-typed transfers into one aggregated transfer.
    ///
    /// Returns `None` for empty input or mixed data types; callers must treat
    /// that as "cannot aggregate", not as an empty result.
    pub fn aggregate_data(&self, transfers: &[DataTransfer]) -> Option<DataTransfer> {
        aggregate(transfers, self.local_level(), self.local_id())
    }
}

/// Pure form of the merge, tagged with the aggregating node's identity.
pub(crate) fn aggregate(
    transfers: &[DataTransfer],
    level: Level,
    node_id: &str,
) -> Option<DataTransfer> {
    let first = transfers.first()?;
    let data_type = first.data_type.as_str();
    if transfers.iter().any(|t| t.data_type != data_type) {
        warn!(expected = data_type, "refusing to aggregate mixed data types");
        return None;
    }

    let mut data = Map::new();
    for transfer in transfers {
        merge_map(&mut data, transfer.data.clone());
    }

    let mut metadata = HashMap::new();
    metadata.insert(meta::SOURCE_COUNT.to_string(), transfers.len().to_string());
    metadata.insert(meta::AGGREGATED_AT.to_string(), now_millis().to_string());

    debug!(
        data_type,
        sources = transfers.len(),
        keys = data.len(),
        "aggregated transfers"
    );

    Some(DataTransfer {
        id: Uuid::new_v4().to_string(),
        source_level: level,
        source_id: node_id.to_string(),
        target_level: None,
        target: None,
        data_type: data_type.to_string(),
        data,
        aggregated: true,
        filtered: false,
        filter_criteria: None,
        metadata,
    })
}

/// Merge `incoming` into `acc`, key by key.
fn merge_map(acc: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match acc.remove(&key) {
            Some(existing) => {
                acc.insert(key, merge_value(existing, value));
            }
            None => {
                acc.insert(key, value);
            }
        }
    }
}

/// Combine two values held under the same key.
fn merge_value(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Number(a), Value::Number(b)) => sum_numbers(&a, &b),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (Value::Object(mut a), Value::Object(b)) => {
            merge_map(&mut a, b);
            Value::Object(a)
        }
        // Type mismatch or plain scalars: the incoming value wins.
        (_, incoming) => incoming,
    }
}

fn sum_numbers(a: &Number, b: &Number) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    match Number::from_f64(x + y) {
        Some(sum) => Value::Number(sum),
        // Non-finite sum: fall back to the incoming value.
        None => Value::Number(b.clone()),
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
