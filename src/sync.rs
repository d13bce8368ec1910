//! The orchestrator: runs the phase sequence for one server.
//!
//! Phases come from the server kind's capability table and run strictly in
//! order, single-threaded: later phases consume identifiers produced by
//! earlier ones (the tag map, app-profile ids, compiled formats). Deletions
//! discovered along the way are queued and drained once at the end, even
//! when a phase failed partway.

use crate::compile::FormatCompiler;
use crate::config::DesiredConfig;
use crate::server::{Phase, ServerKind};
use anyhow::{Context, Result};
use reconcile::value::merge_defaults;
use reconcile::{
    CollectionOptions, DeletionQueue, Error, ReferenceMap, SchemaKeys, SettingsNode, Transport,
    collect_tag_labels, deep_merge, index_by, reconcile_collection, reconcile_contracts,
    resolve_named_ids, sync_tags,
};
use serde_json::{Map, Value, json};

/// Resource sections whose entries may carry tag references.
const TAGGED_SECTIONS: &[&str] = &[
    "indexer",
    "indexerProxy",
    "downloadClient",
    "applications",
    "rootFolder",
];

/// Mutable state threaded through one run's phases.
struct RunState {
    desired: DesiredConfig,
    tags: ReferenceMap,
    deletions: DeletionQueue,
}

/// Applies one server's declared configuration.
pub struct SyncEngine<'a> {
    transport: &'a dyn Transport,
    kind: ServerKind,
    compiler: &'a dyn FormatCompiler,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        kind: ServerKind,
        compiler: &'a dyn FormatCompiler,
    ) -> Self {
        Self {
            transport,
            kind,
            compiler,
        }
    }

    /// Converge the server to the declared configuration.
    ///
    /// The health check and every phase error are fatal to the run; queued
    /// deletions are still drained before the error is returned, so cleanup
    /// discovered by completed phases never depends on later phases
    /// succeeding.
    pub fn sync(&self, declared: &DesiredConfig) -> Result<()> {
        self.transport
            .ping()
            .context("server health check failed")?;

        let mut state = RunState {
            desired: declared.clone(),
            tags: ReferenceMap::new("tag"),
            deletions: DeletionQueue::new(),
        };

        let mut outcome = Ok(());
        for phase in self.kind.phases() {
            log::debug!("{}: running {phase:?}", self.kind);
            if let Err(e) = self.run_phase(*phase, &mut state) {
                outcome = Err(e).with_context(|| format!("{phase:?} phase failed"));
                break;
            }
        }

        state.deletions.drain(self.transport);
        outcome
    }

    fn run_phase(&self, phase: Phase, state: &mut RunState) -> Result<()> {
        match phase {
            Phase::CompileFormats => {
                let compiled = self.compiler.compile(self.kind, state.desired.raw())?;
                state.desired = DesiredConfig::new(compiled);
                Ok(())
            }
            Phase::ResolveTags => {
                let labels = collect_tag_labels(state.desired.raw(), TAGGED_SECTIONS);
                state.tags = sync_tags(self.transport, &labels)?;
                Ok(())
            }
            Phase::DownloadClients => self.contracts(state, "/downloadClient", "downloadClient"),
            Phase::AppProfiles => self.app_profiles(state),
            Phase::Indexers => self.indexers(state),
            Phase::Applications => self.contracts(state, "/applications", "applications"),
            Phase::IndexerProxies => self.contracts(state, "/indexerProxy", "indexerProxy"),
            Phase::QualityDefinitions => self.quality_definitions(state),
            Phase::CustomFormats => self.custom_formats(state),
            Phase::QualityProfiles => self.quality_profiles(state),
            Phase::RootFolderPaths => self.root_folder_paths(state),
            Phase::RootFolders => self.root_folders(state),
            Phase::Notifications => self.contracts(state, "/notification", "notification"),
            Phase::ConfigTree => self.config_tree(state),
        }
    }

    /// Contract sync with no extra defaults and the standard schema keys.
    fn contracts(&self, state: &mut RunState, path: &str, section: &str) -> Result<()> {
        reconcile_contracts(
            self.transport,
            &mut state.deletions,
            &state.tags,
            path,
            state.desired.section(section)?,
            |_, attrs| Ok(attrs),
            &SchemaKeys::default(),
        )?;
        Ok(())
    }

    fn app_profiles(&self, state: &mut RunState) -> Result<()> {
        reconcile_collection(
            self.transport,
            &mut state.deletions,
            "/appprofile",
            state.desired.section("appProfile")?,
            |_, mut attrs| {
                merge_defaults(
                    &mut attrs,
                    &[
                        ("enableRss", json!(true)),
                        ("enableAutomaticSearch", json!(true)),
                        ("enableInteractiveSearch", json!(true)),
                        ("minimumSeeders", json!(1)),
                    ],
                );
                Ok(attrs)
            },
            &CollectionOptions::default(),
        )?;
        Ok(())
    }

    fn indexers(&self, state: &mut RunState) -> Result<()> {
        // Only declared profiles count as assignable when the section is
        // managed; otherwise every remote profile does.
        let declared: Option<Vec<&str>> = state
            .desired
            .section("appProfile")?
            .map(|profiles| profiles.keys().map(String::as_str).collect());
        let profiles =
            resolve_named_ids(self.transport, "/appprofile", declared.as_deref())?;
        let available: Vec<i64> = profiles.values().copied().collect();
        // The fallback is the earliest-created assignable profile
        let default_id = available.iter().copied().min();

        let assign = |name: &str, declared: Option<&Value>| -> reconcile::Result<i64> {
            let fallback = || {
                default_id.ok_or_else(|| {
                    Error::Other(format!("indexer {name:?}: no app profile available"))
                })
            };
            match declared {
                None => fallback(),
                // A stale numeric id falls back rather than erroring:
                // the profile it pointed at may just have been deleted
                Some(Value::Number(n)) => match n.as_i64() {
                    Some(id) if available.contains(&id) => Ok(id),
                    _ => fallback(),
                },
                Some(Value::String(label)) => {
                    profiles
                        .get(label)
                        .copied()
                        .ok_or_else(|| Error::ReferenceResolution {
                            label: label.clone(),
                            namespace: "app profile",
                        })
                }
                Some(other) => Err(Error::Other(format!(
                    "indexer {name:?}: invalid appProfileId {other}"
                ))),
            }
        };

        reconcile_contracts(
            self.transport,
            &mut state.deletions,
            &state.tags,
            "/indexer",
            state.desired.section("indexer")?,
            |name, mut attrs| {
                let id = assign(name, attrs.get("appProfileId"))?;
                attrs.insert("appProfileId".to_string(), json!(id));
                Ok(attrs)
            },
            &SchemaKeys {
                index: "name",
                select: "indexerName",
            },
        )?;
        Ok(())
    }

    /// Quality definitions exist a priori on the server: patch by title,
    /// never create or delete.
    fn quality_definitions(&self, state: &mut RunState) -> Result<()> {
        let Some(declared) = state.desired.section("qualityDefinition")? else {
            return Ok(());
        };
        if declared.is_empty() {
            return Ok(());
        }

        let existing = index_by(&self.transport.get("/qualityDefinition")?, "title");
        for (title, overrides) in declared {
            let record = existing.get(title).ok_or_else(|| Error::ReferenceResolution {
                label: title.clone(),
                namespace: "quality definition",
            })?;
            let body = deep_merge(overrides, record);
            let id = &record["id"];
            self.transport.put(&format!("/qualityDefinition/{id}"), &body)?;
        }
        Ok(())
    }

    fn custom_formats(&self, state: &mut RunState) -> Result<()> {
        reconcile_collection(
            self.transport,
            &mut state.deletions,
            "/customformat",
            state.desired.section("customFormat")?,
            |_, attrs| Ok(attrs),
            &CollectionOptions {
                allow_partial_failure: true,
                ..Default::default()
            },
        )?;
        Ok(())
    }

    fn quality_profiles(&self, state: &mut RunState) -> Result<()> {
        let Some(_) = state.desired.section("qualityProfile")? else {
            return Ok(());
        };

        // Every profile must score every remote format, declared or not
        let formats: Vec<Value> = self
            .transport
            .get("/customformat")?
            .as_array()
            .cloned()
            .unwrap_or_default();

        reconcile_collection(
            self.transport,
            &mut state.deletions,
            "/qualityprofile",
            state.desired.section("qualityProfile")?,
            |_, mut attrs| {
                let declared_scores = index_by(
                    attrs.get("formatItems").unwrap_or(&Value::Null),
                    "name",
                );
                let items: Vec<Value> = formats
                    .iter()
                    .filter_map(|format| {
                        let name = format.get("name")?.as_str()?;
                        let score = declared_scores
                            .get(name)
                            .and_then(|item| item.get("score"))
                            .cloned()
                            .unwrap_or(json!(0));
                        Some(json!({
                            "name": name,
                            "format": format["id"],
                            "score": score,
                        }))
                    })
                    .collect();
                attrs.insert("formatItems".to_string(), json!(items));
                Ok(attrs)
            },
            &CollectionOptions {
                allow_partial_failure: true,
                ..Default::default()
            },
        )?;
        Ok(())
    }

    /// Root folders declared as a list of paths: create missing, queue
    /// undeclared for deletion, leave matches alone (there is nothing to
    /// update on a bare path).
    fn root_folder_paths(&self, state: &mut RunState) -> Result<()> {
        let Some(paths) = state.desired.section_list("rootFolder")? else {
            return Ok(());
        };
        let declared: Vec<&str> = paths.iter().filter_map(Value::as_str).collect();

        let existing = index_by(&self.transport.get("/rootFolder")?, "path");
        for (path, record) in &existing {
            if !declared.contains(&path.as_str()) {
                let id = &record["id"];
                state.deletions.enqueue(format!("/rootFolder/{id}"), None);
            }
        }
        for path in declared {
            if !existing.contains_key(path) {
                self.transport.post("/rootFolder", &json!({ "path": path }))?;
            }
        }
        Ok(())
    }

    /// Root folders as a named collection carrying per-folder defaults that
    /// reference tags and quality/metadata profiles by name.
    fn root_folders(&self, state: &mut RunState) -> Result<()> {
        if state.desired.section("rootFolder")?.is_none() {
            return Ok(());
        }

        let quality = resolve_named_ids(self.transport, "/qualityprofile", None)?;
        let metadata = resolve_named_ids(self.transport, "/metadataprofile", None)?;
        let tags = &state.tags;

        let resolve_profile = |attrs: &Map<String, Value>,
                               key: &str,
                               ids: &std::collections::HashMap<String, i64>,
                               namespace: &'static str|
         -> reconcile::Result<Option<Value>> {
            match attrs.get(key) {
                Some(Value::String(name)) => {
                    let id = ids.get(name).ok_or_else(|| Error::ReferenceResolution {
                        label: name.clone(),
                        namespace,
                    })?;
                    Ok(Some(json!(id)))
                }
                _ => Ok(None),
            }
        };

        reconcile_collection(
            self.transport,
            &mut state.deletions,
            "/rootFolder",
            state.desired.section("rootFolder")?,
            |_, mut attrs| {
                if let Some(declared) = attrs.get("defaultTags") {
                    let resolved = tags.resolve_list(declared)?;
                    attrs.insert("defaultTags".to_string(), resolved);
                }
                if let Some(id) =
                    resolve_profile(&attrs, "defaultQualityProfileId", &quality, "quality profile")?
                {
                    attrs.insert("defaultQualityProfileId".to_string(), id);
                }
                if let Some(id) = resolve_profile(
                    &attrs,
                    "defaultMetadataProfileId",
                    &metadata,
                    "metadata profile",
                )? {
                    attrs.insert("defaultMetadataProfileId".to_string(), id);
                }
                Ok(attrs)
            },
            &CollectionOptions::default(),
        )?;
        Ok(())
    }

    fn config_tree(&self, state: &mut RunState) -> Result<()> {
        let Some(tree) = state.desired.section_value("config") else {
            return Ok(());
        };
        let node = SettingsNode::classify(tree)?;
        node.apply(self.transport, "/config")?;
        Ok(())
    }
}
