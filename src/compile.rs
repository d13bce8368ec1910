//! Boundary to the external format/profile compiler.
//!
//! Sonarr and Radarr declarations may reference custom formats and quality
//! profiles by name only, to be expanded from a community profile database
//! into fully materialized objects. That expansion is an external concern:
//! the sync engine sees it as a pure transformation of the resource tree,
//! injected as a strategy so the data-loading and scoring behavior stays
//! with the implementation, not with the engine.

use crate::server::ServerKind;
use anyhow::Result;
use serde_json::{Map, Value};

/// Expands `customFormat` / `qualityProfile` declarations into fully
/// materialized objects. Must not mutate its input; it returns a
/// transformed copy of the tree.
pub trait FormatCompiler {
    fn compile(&self, kind: ServerKind, resources: &Map<String, Value>)
    -> Result<Map<String, Value>>;
}

/// Pass-through compiler: declarations are taken as already materialized.
#[derive(Debug, Default)]
pub struct NoopCompiler;

impl FormatCompiler for NoopCompiler {
    fn compile(
        &self,
        _kind: ServerKind,
        resources: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        Ok(resources.clone())
    }
}
