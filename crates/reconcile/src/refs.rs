//! Reference resolution: human labels to server-assigned identifiers.
//!
//! Tags and profiles are declared by label/name but referenced by numeric id
//! on the wire. Reference maps are built once per namespace, before any
//! phase that embeds those references runs, and consumed read-only.

use crate::error::{Error, Result};
use crate::transport::Transport;
use serde_json::{Value, json};
use std::collections::HashMap;

/// A resolved label → id lookup table for one reference namespace.
///
/// Lookups are case-insensitive: `"HD"` and `"hd"` are the same label.
#[derive(Debug, Clone)]
pub struct ReferenceMap {
    namespace: &'static str,
    ids: HashMap<String, i64>,
}

impl ReferenceMap {
    pub fn new(namespace: &'static str) -> Self {
        Self {
            namespace,
            ids: HashMap::new(),
        }
    }

    pub fn insert(&mut self, label: &str, id: i64) {
        self.ids.insert(label.to_lowercase(), id);
    }

    pub fn get(&self, label: &str) -> Option<i64> {
        self.ids.get(&label.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resolve a declared label to its id, failing on unknown labels.
    pub fn resolve(&self, label: &str) -> Result<i64> {
        self.get(label).ok_or_else(|| Error::ReferenceResolution {
            label: label.to_string(),
            namespace: self.namespace,
        })
    }

    /// Resolve a list of declared references: string labels are replaced by
    /// their ids, already-numeric entries pass through unchanged.
    pub fn resolve_list(&self, list: &Value) -> Result<Value> {
        let items = match list {
            Value::Array(items) => items,
            _ => return Ok(list.clone()),
        };

        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::String(label) => resolved.push(json!(self.resolve(label)?)),
                other => resolved.push(other.clone()),
            }
        }
        Ok(Value::Array(resolved))
    }
}

/// Collect every tag label referenced by the desired configuration: the
/// explicit top-level `tag` list plus `tags`/`defaultTags` fields inside
/// each entry of the given resource sections. Lowercased and deduplicated,
/// in first-seen order.
pub fn collect_tag_labels(
    cfg: &serde_json::Map<String, Value>,
    sections: &[&str],
) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    let mut push = |label: &str| {
        let label = label.to_lowercase();
        if !labels.contains(&label) {
            labels.push(label);
        }
    };

    if let Some(Value::Array(tags)) = cfg.get("tag") {
        for tag in tags {
            if let Some(label) = tag.as_str() {
                push(label);
            }
        }
    }

    for section in sections {
        let Some(Value::Object(entries)) = cfg.get(*section) else {
            continue;
        };
        for entry in entries.values() {
            for field in ["tags", "defaultTags"] {
                if let Some(Value::Array(tags)) = entry.get(field) {
                    for tag in tags {
                        if let Some(label) = tag.as_str() {
                            push(label);
                        }
                    }
                }
            }
        }
    }

    labels
}

/// Ensure every label exists remotely and build the label → id map.
///
/// Fetches `/tag`, creates missing labels, then re-fetches so the map holds
/// server-assigned ids. Idempotent: a second run with the same labels
/// creates nothing.
pub fn sync_tags(transport: &dyn Transport, labels: &[String]) -> Result<ReferenceMap> {
    let existing: Vec<String> = transport
        .get("/tag")?
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|t| t.get("label").and_then(Value::as_str))
        .map(str::to_lowercase)
        .collect();

    for label in labels {
        let label = label.to_lowercase();
        if !existing.contains(&label) {
            transport.post("/tag", &json!({ "label": label }))?;
        }
    }

    let mut map = ReferenceMap::new("tag");
    for tag in transport.get("/tag")?.as_array().into_iter().flatten() {
        if let (Some(label), Some(id)) = (
            tag.get("label").and_then(Value::as_str),
            tag.get("id").and_then(Value::as_i64),
        ) {
            map.insert(label, id);
        }
    }
    Ok(map)
}

/// Fetch a collection and return its name → id pairs, optionally restricted
/// to an allow-list of names. Used for profile references.
pub fn resolve_named_ids(
    transport: &dyn Transport,
    path: &str,
    filter: Option<&[&str]>,
) -> Result<HashMap<String, i64>> {
    let mut ids = HashMap::new();
    for record in transport.get(path)?.as_array().into_iter().flatten() {
        let (Some(name), Some(id)) = (
            record.get("name").and_then(Value::as_str),
            record.get("id").and_then(Value::as_i64),
        ) else {
            continue;
        };
        if filter.is_none_or(|names| names.contains(&name)) {
            ids.insert(name.to_string(), id);
        }
    }
    Ok(ids)
}
