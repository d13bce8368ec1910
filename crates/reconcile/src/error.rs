//! Error types for reconciliation against a remote REST API.
//!
//! Errors are categorized to enable retry logic at the transport level and
//! precise reporting at the orchestration level. A failed request carries the
//! full request/response context so a failed run can be diagnosed from the
//! error alone.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while reconciling remote resources.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered with a non-success status.
    #[error(
        "{method} {path} failed with status {status}\nrequest: {request:#}\nresponse: {response:#}"
    )]
    RemoteRequest {
        /// HTTP method of the failed call
        method: &'static str,
        /// Request path relative to the API root
        path: String,
        /// Request body that was sent (JSON null when there was none)
        request: Value,
        /// Response body as returned by the server (JSON null when empty)
        response: Value,
        /// HTTP status code
        status: u16,
    },

    /// A declared resource refers to a label or name with no entry in the
    /// corresponding reference map.
    #[error("unknown {namespace} reference: {label:?}")]
    ReferenceResolution {
        /// The unresolved label as declared
        label: String,
        /// Which reference namespace was consulted (tags, app profiles, ...)
        namespace: &'static str,
    },

    /// A contract resource selects an implementation the server's schema
    /// does not define.
    #[error("no schema entry for implementation {implementation:?} under {path}")]
    SchemaMismatch {
        /// The declared discriminator value
        implementation: String,
        /// Resource collection path the schema was fetched for
        path: String,
    },

    /// Connection-level failure (DNS, refused, timeout, TLS, ...).
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed network operation
        message: String,
    },

    /// Response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is typically transient and worth retrying.
    ///
    /// Network failures and server-side (5xx) responses are transient;
    /// everything else reflects the request itself and retrying would only
    /// repeat the failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::RemoteRequest { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
