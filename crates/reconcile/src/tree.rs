//! Catch-all patcher for nested settings endpoints.
//!
//! Settings groups that are not modeled as named collections (`/config/host`,
//! `/config/ui`, ...) are declared as a free-form tree. The tree is
//! classified once at parse time into an explicit shape, so the
//! collection-or-resource-or-namespace ambiguity is resolved before any
//! network call:
//!
//! - a sequence is a collection of anonymous objects, each created
//!   independently at the current path
//! - a mapping holding at least one non-container value (or the explicit
//!   `__req` force marker) is a single resource, deep-merged over the
//!   current remote value and written back with one update
//! - any other mapping is a pure namespace: recurse into each child under
//!   `path + "/" + key`, with no network call at this level

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::value::deep_merge;
use serde_json::{Map, Value};

/// Marker key forcing a mapping with only container values to be treated as
/// a single updatable resource. Stripped before sending.
pub const FORCE_UPDATE_MARKER: &str = "__req";

/// A classified settings subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsNode {
    /// Namespace of nested settings, one child per path segment.
    Group(Vec<(String, SettingsNode)>),
    /// One updatable resource body.
    Single(Map<String, Value>),
    /// Collection of anonymous objects to create.
    ObjectList(Vec<Value>),
}

impl SettingsNode {
    /// Classify a declared settings tree.
    pub fn classify(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(SettingsNode::ObjectList(items.clone())),
            Value::Object(map) => {
                let forced = map.contains_key(FORCE_UPDATE_MARKER);
                let has_leaf = map
                    .values()
                    .any(|v| !matches!(v, Value::Object(_) | Value::Array(_)));

                if forced || has_leaf {
                    let mut body = map.clone();
                    body.remove(FORCE_UPDATE_MARKER);
                    return Ok(SettingsNode::Single(body));
                }

                let mut children = Vec::with_capacity(map.len());
                for (key, child) in map {
                    children.push((key.clone(), SettingsNode::classify(child)?));
                }
                Ok(SettingsNode::Group(children))
            }
            other => Err(Error::Other(format!(
                "settings node must be a mapping or sequence, got {other}"
            ))),
        }
    }

    /// Apply this subtree onto the remote resource at `path`.
    pub fn apply(&self, transport: &dyn Transport, path: &str) -> Result<()> {
        match self {
            SettingsNode::Group(children) => {
                for (key, child) in children {
                    child.apply(transport, &format!("{path}/{key}"))?;
                }
                Ok(())
            }
            SettingsNode::Single(body) => {
                let current = transport.get(path)?;
                let merged = deep_merge(&Value::Object(body.clone()), &current);
                transport.put(path, &merged)?;
                Ok(())
            }
            SettingsNode::ObjectList(items) => {
                for item in items {
                    transport.post(path, item)?;
                }
                Ok(())
            }
        }
    }
}
