//! JSON tree helpers shared by the reconcilers.
//!
//! Remote resources, schemas, and the desired configuration are all
//! `serde_json` trees; the reconciliation algorithms are expressed as a
//! handful of merge/index/convert operations over them.

use serde_json::{Map, Value};

/// Recursively merge `overlay` onto `base`; `overlay` wins on conflicts.
///
/// Two objects merge key by key, everything else is replaced wholesale by
/// the overlay value. Neither input is mutated.
pub fn deep_merge(overlay: &Value, base: &Value) -> Value {
    match (overlay, base) {
        (Value::Object(over), Value::Object(under)) => {
            let mut merged = under.clone();
            for (key, value) in over {
                let combined = match merged.get(key) {
                    Some(existing) => deep_merge(value, existing),
                    None => value.clone(),
                };
                merged.insert(key.clone(), combined);
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

/// Index an array of objects by a string-valued natural-key field.
///
/// Elements that are not objects or lack a string `key` field are ignored.
pub fn index_by(list: &Value, key: &str) -> Map<String, Value> {
    let mut indexed = Map::new();
    if let Value::Array(items) = list {
        for item in items {
            if let Some(name) = item.get(key).and_then(Value::as_str) {
                indexed.insert(name.to_string(), item.clone());
            }
        }
    }
    indexed
}

/// Convert a wire-format field list (`[{name, value?}]`) into a
/// field-name → value mapping. A missing `value` becomes JSON null.
pub fn fields_to_map(fields: &Value) -> Map<String, Value> {
    let mut map = Map::new();
    if let Value::Array(items) = fields {
        for field in items {
            if let Some(name) = field.get("name").and_then(Value::as_str) {
                let value = field.get("value").cloned().unwrap_or(Value::Null);
                map.insert(name.to_string(), value);
            }
        }
    }
    map
}

/// Convert a field-name → value mapping back into the wire-format list.
/// Null values are sent as `{name}` with the `value` key omitted.
pub fn fields_from_map(fields: &Map<String, Value>) -> Value {
    let items = fields
        .iter()
        .map(|(name, value)| {
            let mut field = Map::new();
            field.insert("name".to_string(), Value::String(name.clone()));
            if !value.is_null() {
                field.insert("value".to_string(), value.clone());
            }
            Value::Object(field)
        })
        .collect();
    Value::Array(items)
}

/// Insert each `(key, value)` default into `entry` unless the key is
/// already set. Explicitly declared values always win over defaults.
pub fn merge_defaults(entry: &mut Map<String, Value>, defaults: &[(&str, Value)]) {
    for (key, value) in defaults {
        if !entry.contains_key(*key) {
            entry.insert((*key).to_string(), value.clone());
        }
    }
}
