//! Deferred deletion of orphaned resources.
//!
//! Deletions discovered while reconciling are never applied inline; they are
//! queued and drained once, after every create/update phase across all
//! resource types has run. Draining is best-effort: one resource's failed
//! delete must not block cleanup of the others.

use crate::transport::Transport;
use serde_json::Value;

/// FIFO queue of `(path, body)` deletions collected during a sync run.
#[derive(Debug, Default)]
pub struct DeletionQueue {
    entries: Vec<(String, Option<Value>)>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delete of `path` for the drain phase.
    pub fn enqueue(&mut self, path: impl Into<String>, body: Option<Value>) {
        self.entries.push((path.into(), body));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths currently queued, in enqueue order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    /// Issue every queued delete in enqueue order.
    ///
    /// Individual failures are logged and skipped; the queue is left empty
    /// either way and this never returns an error.
    pub fn drain(&mut self, transport: &dyn Transport) {
        for (path, body) in self.entries.drain(..) {
            if let Err(e) = transport.delete(&path, body.as_ref()) {
                log::warn!("failed to delete {path}: {e}");
            }
        }
    }
}
