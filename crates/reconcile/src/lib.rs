//! # Reconcile
//!
//! A small engine for declarative reconciliation of REST-managed resource
//! collections: diff a desired configuration against a server's live state
//! and converge the server by creating, updating, and deleting resources.
//!
//! ## Core concepts
//!
//! - **Transport**: a synchronous request channel to one server, with
//!   uniform error classification and transient-fault retry
//! - **Collection reconciler**: diff/apply for simple name-keyed resource
//!   collections
//! - **Contract reconciler**: diff/apply for schema-backed resources whose
//!   shape depends on a selected implementation
//! - **Reference map**: resolved label → server-assigned-id lookups (tags,
//!   profiles) consumed by later phases
//! - **Deletion queue**: removals discovered during reconciliation, applied
//!   best-effort after all create/update work completes
//! - **Settings tree**: a catch-all patcher for nested settings endpoints
//!   that are not modeled as named collections
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{
//!     CollectionOptions, DeletionQueue, HttpTransport, reconcile_collection,
//! };
//! use serde_json::json;
//!
//! let transport = HttpTransport::new("http://localhost:8989", "/api/v3", key);
//! let mut deletions = DeletionQueue::new();
//!
//! let desired = json!({"qbit": {"host": "qbit.local"}});
//! reconcile_collection(
//!     &transport,
//!     &mut deletions,
//!     "/downloadClient",
//!     Some(desired.as_object().unwrap()),
//!     |_, attrs| Ok(attrs),
//!     &CollectionOptions::default(),
//! )?;
//!
//! deletions.drain(&transport);
//! ```
//!
//! The engine is deliberately single-threaded and fully synchronous: later
//! calls depend on identifiers produced by earlier ones (reference maps,
//! schema fetches, existing-resource snapshots), so there is nothing to
//! overlap.

pub mod collection;
pub mod contract;
pub mod deletion;
pub mod error;
pub mod refs;
pub mod retry;
pub mod transport;
pub mod tree;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export main types at crate root
pub use collection::{CollectionOptions, reconcile_collection};
pub use contract::{SchemaKeys, reconcile_contracts};
pub use deletion::DeletionQueue;
pub use error::{Error, Result};
pub use refs::{ReferenceMap, collect_tag_labels, resolve_named_ids, sync_tags};
pub use retry::{RetryConfig, with_retry};
pub use transport::{HttpTransport, Method, Transport};
pub use tree::SettingsNode;
pub use value::{deep_merge, fields_from_map, fields_to_map, index_by};
