//! Diff/apply for simple name-keyed resource collections.
//!
//! Covers resource types whose records are plain attribute maps with a
//! natural key (name, path, title). Schema-backed resources with field
//! lists go through [`crate::contract`] instead.

use crate::deletion::DeletionQueue;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::value::{index_by, merge_defaults};
use serde_json::{Map, Value, json};

/// Options for one collection reconciliation.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Log per-entry failures and continue instead of aborting the call.
    pub allow_partial_failure: bool,
    /// Field the collection is keyed by.
    pub natural_key: &'static str,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            allow_partial_failure: false,
            natural_key: "name",
        }
    }
}

/// Converge the collection at `path` to the desired entries.
///
/// - `desired: None` means the resource type is unmanaged: nothing is
///   touched, nothing is deleted.
/// - Existing records whose key is not declared are queued on `deletions`
///   for the deferred drain, never deleted inline.
/// - Declared entries run through `defaults`, get the natural key injected
///   (declared values win over both), and are then created, or updated as
///   the existing record's attributes overlaid with the declared ones.
///
/// Without `allow_partial_failure` the first entry error aborts the call;
/// already-queued deletions stay queued either way.
pub fn reconcile_collection(
    transport: &dyn Transport,
    deletions: &mut DeletionQueue,
    path: &str,
    desired: Option<&Map<String, Value>>,
    defaults: impl Fn(&str, Map<String, Value>) -> Result<Map<String, Value>>,
    opts: &CollectionOptions,
) -> Result<()> {
    let Some(desired) = desired else {
        return Ok(());
    };

    let existing = index_by(&transport.get(path)?, opts.natural_key);

    for (name, record) in &existing {
        if !desired.contains_key(name) {
            match record.get("id") {
                Some(id) => deletions.enqueue(format!("{path}/{id}"), None),
                None => log::warn!("{path} record {name:?} has no id, cannot delete"),
            }
        }
    }

    for (name, attrs) in desired {
        let attrs = match attrs {
            Value::Object(map) => map.clone(),
            other => {
                return Err(Error::Other(format!(
                    "{path} entry {name:?} must be an object, got {other}"
                )));
            }
        };

        let result = defaults(name, attrs).and_then(|mut body| {
            merge_defaults(&mut body, &[(opts.natural_key, json!(name))]);

            match existing.get(name) {
                Some(record) => {
                    // Full existing record as base, declared attributes win
                    let mut merged = record.as_object().cloned().unwrap_or_default();
                    merged.extend(body);
                    let id = &record["id"];
                    transport.put(&format!("{path}/{id}"), &Value::Object(merged))
                }
                None => transport.post(path, &Value::Object(body)),
            }
        });

        if let Err(e) = result {
            if !opts.allow_partial_failure {
                return Err(e);
            }
            log::error!("{path} entry {name:?} failed: {e}");
        }
    }

    Ok(())
}
