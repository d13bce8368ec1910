//! Diff/apply for schema-backed, polymorphic resources.
//!
//! Contract-backed resource types (indexers, download clients, notifications,
//! applications) select an implementation and carry a field list whose valid
//! shape is defined by the server's schema for that implementation. The
//! reconciler merges declared values over the existing record and the schema
//! defaults, translating the field list between its wire shape
//! (`[{name, value?}]`) and a field-name → value mapping along the way.

use crate::deletion::DeletionQueue;
use crate::error::{Error, Result};
use crate::refs::ReferenceMap;
use crate::transport::Transport;
use crate::value::{deep_merge, fields_from_map, fields_to_map, index_by, merge_defaults};
use serde_json::{Map, Value, json};

/// Which attribute indexes the schema collection and which attribute of a
/// declared entry selects its schema record.
///
/// Defaults to `implementation` on both sides; prowlarr indexers use the
/// schema's `name` selected by the entry's `indexerName`.
#[derive(Debug, Clone)]
pub struct SchemaKeys {
    /// Field the schema collection is indexed by.
    pub index: &'static str,
    /// Entry attribute whose value selects the schema record.
    pub select: &'static str,
}

impl Default for SchemaKeys {
    fn default() -> Self {
        Self {
            index: "implementation",
            select: "implementation",
        }
    }
}

/// Replace a record's wire-format `fields` list with its mapping form.
fn map_fields(record: &mut Map<String, Value>) {
    if let Some(fields) = record.get("fields") {
        let mapped = fields_to_map(fields);
        record.insert("fields".to_string(), Value::Object(mapped));
    }
}

/// Fetch and prepare the schema collection for `path`: indexed by
/// `keys.index`, `presets` stripped, field lists in mapping form.
fn fetch_schema(
    transport: &dyn Transport,
    path: &str,
    keys: &SchemaKeys,
) -> Result<Map<String, Value>> {
    let mut schema = index_by(&transport.get(&format!("{path}/schema"))?, keys.index);
    for record in schema.values_mut() {
        if let Value::Object(map) = record {
            // Remote servers omit this key inconsistently; their own clients
            // drop it before reuse, so drop it here too.
            map.remove("presets");
            map_fields(map);
        }
    }
    Ok(schema)
}

/// Converge the contract-backed collection at `path` to the desired entries.
///
/// The merge order, per entry: existing record (base) ← declared attributes
/// ← `{enable: true, name}` gaps ← schema defaults as base under it all ←
/// the same gap pass again ← the caller's `defaults`. Tag labels are then
/// resolved to ids and the field mapping is converted back to the wire list.
///
/// Matched entries are replaced via PUT with the existing id; everything
/// else is created. Undeclared existing records are queued on `deletions`.
/// The first error aborts the call; the orchestrator decides per resource
/// type whether to tolerate it.
pub fn reconcile_contracts(
    transport: &dyn Transport,
    deletions: &mut DeletionQueue,
    tags: &ReferenceMap,
    path: &str,
    desired: Option<&Map<String, Value>>,
    defaults: impl Fn(&str, Map<String, Value>) -> Result<Map<String, Value>>,
    keys: &SchemaKeys,
) -> Result<()> {
    let Some(desired) = desired else {
        return Ok(());
    };

    let mut existing = index_by(&transport.get(path)?, "name");
    for record in existing.values_mut() {
        if let Value::Object(map) = record {
            map_fields(map);
        }
    }

    let schema = fetch_schema(transport, path, keys)?;

    let mut bodies: Vec<(String, Value)> = Vec::new();
    for (name, attrs) in desired {
        let base = existing.get(name).cloned().unwrap_or(json!({}));
        let merged = deep_merge(attrs, &base);
        let mut entry = match merged {
            Value::Object(map) => map,
            other => {
                return Err(Error::Other(format!(
                    "{path} entry {name:?} must be an object, got {other}"
                )));
            }
        };
        merge_defaults(&mut entry, &[("enable", json!(true)), ("name", json!(name))]);

        let implementation = entry
            .get(keys.select)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Other(format!(
                "{path} entry {name:?} does not declare {:?}",
                keys.select
            )))?
            .to_string();
        let schema_entry = schema.get(&implementation).ok_or_else(|| Error::SchemaMismatch {
            implementation: implementation.clone(),
            path: path.to_string(),
        })?;

        // Schema is the base: every field it defines gets backfilled
        let mut entry = match deep_merge(&Value::Object(entry), schema_entry) {
            Value::Object(map) => map,
            _ => unreachable!("merge of two objects"),
        };

        // The schema record may carry its own enable/name; the entry's
        // values won the merge, this pass only fills true gaps
        merge_defaults(&mut entry, &[("enable", json!(true)), ("name", json!(name))]);
        let mut entry = defaults(name, entry)?;

        // Servers expect both keys on every body, empty or not
        merge_defaults(&mut entry, &[("tags", json!([])), ("fields", json!({}))]);

        if let Some(declared_tags) = entry.get("tags") {
            let resolved = tags.resolve_list(declared_tags)?;
            entry.insert("tags".to_string(), resolved);
        }
        if let Some(Value::Object(fields)) = entry.get("fields") {
            let wire = fields_from_map(fields);
            entry.insert("fields".to_string(), wire);
        }

        bodies.push((name.clone(), Value::Object(entry)));
    }

    for (name, record) in &existing {
        if !desired.contains_key(name) {
            match record.get("id") {
                Some(id) => deletions.enqueue(format!("{path}/{id}"), None),
                None => log::warn!("{path} record {name:?} has no id, cannot delete"),
            }
        }
    }

    for (name, body) in bodies {
        match existing.get(&name) {
            Some(record) => {
                let id = &record["id"];
                transport.put(&format!("{path}/{id}"), &body)?;
            }
            None => {
                transport.post(path, &body)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeServer;
    use crate::transport::Method;
    use serde_json::json;

    fn desired(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn no_defaults(_: &str, attrs: Map<String, Value>) -> crate::Result<Map<String, Value>> {
        Ok(attrs)
    }

    fn wire_field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
        record["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == json!(name))
    }

    fn qbit_schema() -> Value {
        json!([{
            "implementation": "QBittorrent",
            "implementationName": "qBittorrent",
            "configContract": "QBittorrentSettings",
            "presets": [{"leftover": true}],
            "fields": [
                {"name": "host", "value": "localhost"},
                {"name": "port", "value": 8080},
                {"name": "password"}
            ]
        }])
    }

    #[test]
    fn test_create_backfills_schema_defaults() {
        let server = FakeServer::new();
        server.set_document("/downloadClient/schema", qbit_schema());
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/downloadClient",
            Some(&desired(json!({
                "qbit": {
                    "implementation": "QBittorrent",
                    "fields": {"host": "qbit.local"}
                }
            }))),
            no_defaults,
            &SchemaKeys::default(),
        )
        .unwrap();

        let records = server.records("/downloadClient");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["name"], json!("qbit"));
        assert_eq!(record["enable"], json!(true));
        assert_eq!(record["configContract"], json!("QBittorrentSettings"));
        // Declared field wins, schema fills the rest
        assert_eq!(wire_field(record, "host").unwrap()["value"], json!("qbit.local"));
        assert_eq!(wire_field(record, "port").unwrap()["value"], json!(8080));
        // Null schema default round-trips to an entry with no value
        assert!(wire_field(record, "password").unwrap().get("value").is_none());
        // The non-portable schema key never reaches the server
        assert!(record.get("presets").is_none());
    }

    #[test]
    fn test_update_replaces_with_existing_id() {
        let server = FakeServer::new();
        server.set_document("/downloadClient/schema", qbit_schema());
        let id = server.seed(
            "/downloadClient",
            json!({
                "name": "qbit",
                "enable": false,
                "implementation": "QBittorrent",
                "fields": [{"name": "host", "value": "old.local"}]
            }),
        );
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/downloadClient",
            Some(&desired(json!({
                "qbit": {"fields": {"host": "new.local"}}
            }))),
            no_defaults,
            &SchemaKeys::default(),
        )
        .unwrap();

        assert_eq!(server.request_count(Method::Put, "/downloadClient"), 1);
        assert_eq!(server.request_count(Method::Post, "/downloadClient"), 0);
        let records = server.records("/downloadClient");
        assert_eq!(records[0]["id"], json!(id));
        // Existing attribute survives the merge (declared did not set it)
        assert_eq!(records[0]["enable"], json!(false));
        assert_eq!(wire_field(&records[0], "host").unwrap()["value"], json!("new.local"));
    }

    #[test]
    fn test_body_always_carries_tags_and_fields() {
        let server = FakeServer::new();
        // Schema entry with neither a field list nor tags
        server.set_document(
            "/notification/schema",
            json!([{"implementation": "Webhook"}]),
        );
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/notification",
            Some(&desired(json!({
                "hook": {"implementation": "Webhook"}
            }))),
            no_defaults,
            &SchemaKeys::default(),
        )
        .unwrap();

        let records = server.records("/notification");
        assert_eq!(records[0]["tags"], json!([]));
        assert_eq!(records[0]["fields"], json!([]));
    }

    #[test]
    fn test_undeclared_contract_is_queued_for_deletion() {
        let server = FakeServer::new();
        server.set_document("/indexer/schema", json!([]));
        let id = server.seed(
            "/indexer",
            json!({"name": "stale", "implementation": "Torznab", "fields": []}),
        );
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/indexer",
            Some(&desired(json!({}))),
            no_defaults,
            &SchemaKeys::default(),
        )
        .unwrap();

        let queued: Vec<&str> = deletions.paths().collect();
        assert_eq!(queued, vec![format!("/indexer/{id}")]);
        assert_eq!(server.records("/indexer").len(), 1);
    }

    #[test]
    fn test_unknown_implementation_is_schema_mismatch() {
        let server = FakeServer::new();
        server.set_document("/notification/schema", json!([]));
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        let result = reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/notification",
            Some(&desired(json!({
                "hook": {"implementation": "Webhook"}
            }))),
            no_defaults,
            &SchemaKeys::default(),
        );

        assert!(matches!(
            result,
            Err(Error::SchemaMismatch { implementation, .. }) if implementation == "Webhook"
        ));
        // Nothing was created or queued
        assert!(server.records("/notification").is_empty());
        assert!(deletions.is_empty());
    }

    #[test]
    fn test_tag_labels_resolved_case_insensitively() {
        let server = FakeServer::new();
        server.set_document("/indexer/schema", json!([{
            "implementation": "Torznab",
            "fields": []
        }]));
        let mut deletions = DeletionQueue::new();
        let mut tags = ReferenceMap::new("tag");
        tags.insert("anime", 4);

        reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/indexer",
            Some(&desired(json!({
                "nyaa": {"implementation": "Torznab", "tags": ["Anime", 9]}
            }))),
            no_defaults,
            &SchemaKeys::default(),
        )
        .unwrap();

        let records = server.records("/indexer");
        assert_eq!(records[0]["tags"], json!([4, 9]));
    }

    #[test]
    fn test_unknown_tag_label_fails() {
        let server = FakeServer::new();
        server.set_document("/indexer/schema", json!([{
            "implementation": "Torznab",
            "fields": []
        }]));
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        let result = reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/indexer",
            Some(&desired(json!({
                "nyaa": {"implementation": "Torznab", "tags": ["missing"]}
            }))),
            no_defaults,
            &SchemaKeys::default(),
        );

        assert!(matches!(result, Err(Error::ReferenceResolution { .. })));
    }

    #[test]
    fn test_alternate_schema_keys() {
        let server = FakeServer::new();
        server.set_document("/indexer/schema", json!([{
            "name": "Nyaa.si",
            "implementation": "Cardigann",
            "fields": [{"name": "baseUrl", "value": "https://nyaa.si"}]
        }]));
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        let keys = SchemaKeys {
            index: "name",
            select: "indexerName",
        };
        reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/indexer",
            Some(&desired(json!({
                "nyaa": {"indexerName": "Nyaa.si"}
            }))),
            no_defaults,
            &keys,
        )
        .unwrap();

        let records = server.records("/indexer");
        assert_eq!(records[0]["implementation"], json!("Cardigann"));
        // Entry key wins over the schema record's own name
        assert_eq!(records[0]["name"], json!("nyaa"));
        assert_eq!(
            wire_field(&records[0], "baseUrl").unwrap()["value"],
            json!("https://nyaa.si")
        );
    }

    #[test]
    fn test_unmanaged_section_is_noop() {
        let server = FakeServer::new();
        server.seed("/notification", json!({"name": "keep"}));
        let mut deletions = DeletionQueue::new();
        let tags = ReferenceMap::new("tag");

        reconcile_contracts(
            &server,
            &mut deletions,
            &tags,
            "/notification",
            None,
            no_defaults,
            &SchemaKeys::default(),
        )
        .unwrap();

        assert!(server.requests().is_empty());
        assert!(deletions.is_empty());
    }
}
