//! HTTP transport with uniform error classification and retry.
//!
//! The reconcilers never talk to `ureq` directly; they go through the
//! [`Transport`] trait so they can be driven against an in-memory server in
//! tests. [`HttpTransport`] is the production implementation.

use crate::error::{Error, Result};
use crate::retry::{RetryConfig, with_retry};
use serde_json::Value;
use std::fmt;
use ureq::Agent;

/// HTTP method of a reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synchronous request channel to one remote server's resource API.
///
/// `path` is always relative to the API root (e.g. `/tag`,
/// `/downloadClient/3`). Implementations return the parsed response body;
/// an empty body parses as JSON null.
pub trait Transport {
    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value>;

    /// Health check; must succeed before any reconciliation phase runs.
    fn ping(&self) -> Result<()>;

    fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::Get, path, None)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::Post, path, Some(body))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::Put, path, Some(body))
    }

    fn delete(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Delete, path, body)
    }
}

/// `ureq`-backed transport for one server.
///
/// Every call is retried on transient failures (connection errors and 5xx
/// responses) with capped exponential backoff. Retries apply uniformly to
/// all methods, POST included: a create that succeeded server-side right
/// before a transient failure can be applied twice. That matches the
/// upstream behavior this engine reconciles against and is accepted here
/// rather than special-cased.
pub struct HttpTransport {
    agent: Agent,
    base_url: String,
    api_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Create a transport for `base_url` with the given API version path
    /// (e.g. `/api/v3`) and API key.
    pub fn new(
        base_url: &str,
        api_path: &str,
        api_key: impl Into<String>,
    ) -> Self {
        // Non-2xx responses are classified here, not by the client library.
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();

        let base_url = base_url.trim_end_matches('/').to_string();
        let api_url = format!("{base_url}{api_path}");
        Self {
            agent,
            base_url,
            api_url,
            api_key: api_key.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The API root every request path is appended to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn call_once(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{path}", self.api_url);

        let result = match method {
            // GET and DELETE carry no payload on the wire; a queued delete
            // body is context for logging only.
            Method::Get => self.agent.get(&url).header("X-Api-Key", &self.api_key).call(),
            Method::Delete => self
                .agent
                .delete(&url)
                .header("X-Api-Key", &self.api_key)
                .call(),
            Method::Post => self
                .agent
                .post(&url)
                .header("X-Api-Key", &self.api_key)
                .send_json(body.unwrap_or(&Value::Null)),
            Method::Put => self
                .agent
                .put(&url)
                .header("X-Api-Key", &self.api_key)
                .send_json(body.unwrap_or(&Value::Null)),
        };

        let mut res = result.map_err(|e| Error::Network {
            message: e.to_string(),
        })?;

        let status = res.status().as_u16();
        let text = res
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Network {
                message: e.to_string(),
            })?;
        let parsed = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        log::debug!("=> {parsed}");

        if status >= 300 {
            return Err(Error::RemoteRequest {
                method: method.as_str(),
                path: path.to_string(),
                request: body.cloned().unwrap_or(Value::Null),
                response: parsed,
                status,
            });
        }
        Ok(parsed)
    }
}

impl Transport for HttpTransport {
    /// `GET {baseUrl}/ping`, outside the API version path but through the
    /// same header and retry path as every other call. Any error status
    /// fails the check.
    fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        log::info!("GET {url}");
        with_retry(&self.retry, || {
            let res = self
                .agent
                .get(&url)
                .header("X-Api-Key", &self.api_key)
                .call()
                .map_err(|e| Error::Network {
                    message: e.to_string(),
                })?;

            let status = res.status().as_u16();
            if status >= 300 {
                return Err(Error::RemoteRequest {
                    method: "GET",
                    path: "/ping".to_string(),
                    request: Value::Null,
                    response: Value::Null,
                    status,
                });
            }
            Ok(())
        })
    }

    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "{method} {}{path} {}",
                self.api_url,
                body.map(Value::to_string).unwrap_or_default()
            );
        } else {
            log::info!("{method} {}{path}", self.api_url);
        }

        with_retry(&self.retry, || self.call_once(method, path, body))
    }
}
