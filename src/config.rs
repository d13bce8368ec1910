//! Declaration file loading and the desired-configuration view.

use crate::server::ServerKind;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Top-level declaration file: one or more servers, each with its desired
/// resource tree.
#[derive(Debug, Deserialize)]
pub struct Declaration {
    pub servers: BTreeMap<String, ServerDecl>,
}

/// One server's connection details plus its declared resources.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDecl {
    #[serde(rename = "type")]
    pub kind: ServerKind,
    pub url: String,
    pub api_key: String,
    /// The resource tree consumed by the sync engine. Kept as raw JSON:
    /// resource shapes are server-defined, not modeled here.
    #[serde(default)]
    pub resources: Map<String, Value>,
}

impl Declaration {
    /// Load a declaration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid declaration in {}", path.display()))
    }
}

/// Read-only view over one server's desired resource tree.
///
/// A top-level key that is missing or explicitly null marks that resource
/// type as unmanaged: the engine leaves every existing remote resource of
/// that type untouched. A key that is present with the wrong shape is an
/// error, never treated as unmanaged: declared intent must not be dropped
/// silently.
#[derive(Debug, Clone)]
pub struct DesiredConfig {
    resources: Map<String, Value>,
}

impl DesiredConfig {
    pub fn new(resources: Map<String, Value>) -> Self {
        Self { resources }
    }

    /// The whole tree, for label collection and the compiler boundary.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.resources
    }

    /// A managed name-keyed section, or `None` when unmanaged.
    pub fn section(&self, key: &str) -> Result<Option<&Map<String, Value>>> {
        match self.resources.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => bail!("resource section {key:?} must be a mapping, got {other}"),
        }
    }

    /// A managed list-valued section, or `None` when unmanaged.
    pub fn section_list(&self, key: &str) -> Result<Option<&Vec<Value>>> {
        match self.resources.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => bail!("resource section {key:?} must be a sequence, got {other}"),
        }
    }

    /// A managed section of any shape, or `None` when unmanaged.
    pub fn section_value(&self, key: &str) -> Option<&Value> {
        self.resources.get(key).filter(|v| !v.is_null())
    }
}
