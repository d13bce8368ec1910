//! In-memory server double used by the unit tests.
//!
//! Behaves like one remote server's resource API: collections addressed by
//! path, `POST` assigns ids, `PUT`/`DELETE` address `{path}/{id}`, and
//! arbitrary document paths (schemas, settings groups) can be seeded
//! directly. Every request is recorded for assertions.

use crate::error::{Error, Result};
use crate::transport::{Method, Transport};
use serde_json::{Map, Value, json};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub(crate) struct FakeServer {
    collections: RefCell<HashMap<String, Vec<Value>>>,
    documents: RefCell<HashMap<String, Value>>,
    log: RefCell<Vec<(Method, String, Option<Value>)>>,
    fail: RefCell<HashMap<(Method, String), u16>>,
    next_id: Cell<i64>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            collections: RefCell::new(HashMap::new()),
            documents: RefCell::new(HashMap::new()),
            log: RefCell::new(Vec::new()),
            fail: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Insert a record into a collection, assigning it an id. Returns the id.
    pub fn seed(&self, path: &str, attrs: Value) -> i64 {
        let record = self.assign_id(attrs);
        let id = record["id"].as_i64().unwrap();
        self.collections
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .push(record);
        id
    }

    /// Serve a fixed document (schema list, settings group) at an exact path.
    pub fn set_document(&self, path: &str, doc: Value) {
        self.documents
            .borrow_mut()
            .insert(path.to_string(), doc);
    }

    /// Respond to `method path` with the given error status.
    pub fn fail_with(&self, method: Method, path: &str, status: u16) {
        self.fail
            .borrow_mut()
            .insert((method, path.to_string()), status);
    }

    /// Current records of a collection.
    pub fn records(&self, path: &str) -> Vec<Value> {
        self.collections
            .borrow()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Current content of a document path.
    pub fn document(&self, path: &str) -> Value {
        self.documents
            .borrow()
            .get(path)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Everything that has been requested, in order.
    pub fn requests(&self) -> Vec<(Method, String, Option<Value>)> {
        self.log.borrow().clone()
    }

    /// Number of requests issued with the given method to paths starting
    /// with `prefix`.
    pub fn request_count(&self, method: Method, prefix: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|(m, p, _)| *m == method && p.starts_with(prefix))
            .count()
    }

    fn assign_id(&self, attrs: Value) -> Value {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let mut map = match attrs {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        map.insert("id".to_string(), json!(id));
        Value::Object(map)
    }

    fn error(&self, method: Method, path: &str, body: Option<&Value>, status: u16) -> Error {
        Error::RemoteRequest {
            method: method.as_str(),
            path: path.to_string(),
            request: body.cloned().unwrap_or(Value::Null),
            response: Value::Null,
            status,
        }
    }
}

/// Split `{collection}/{id}` into its parts when the trailing segment is
/// numeric.
fn split_id(path: &str) -> Option<(&str, i64)> {
    let (collection, tail) = path.rsplit_once('/')?;
    tail.parse().ok().map(|id| (collection, id))
}

impl Transport for FakeServer {
    fn ping(&self) -> Result<()> {
        self.log
            .borrow_mut()
            .push((Method::Get, "/ping".to_string(), None));
        match self.fail.borrow().get(&(Method::Get, "/ping".to_string())) {
            Some(status) => Err(self.error(Method::Get, "/ping", None, *status)),
            None => Ok(()),
        }
    }

    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.log
            .borrow_mut()
            .push((method, path.to_string(), body.cloned()));

        if let Some(status) = self.fail.borrow().get(&(method, path.to_string())) {
            return Err(self.error(method, path, body, *status));
        }

        match method {
            Method::Get => {
                if let Some(doc) = self.documents.borrow().get(path) {
                    return Ok(doc.clone());
                }
                Ok(Value::Array(self.records(path)))
            }
            Method::Post => {
                let record = self.assign_id(body.cloned().unwrap_or(Value::Null));
                self.collections
                    .borrow_mut()
                    .entry(path.to_string())
                    .or_default()
                    .push(record.clone());
                Ok(record)
            }
            Method::Put => {
                if let Some((collection, id)) = split_id(path) {
                    let mut collections = self.collections.borrow_mut();
                    let records = collections.entry(collection.to_string()).or_default();
                    for slot in records.iter_mut() {
                        if slot.get("id").and_then(Value::as_i64) == Some(id) {
                            let mut updated = body.cloned().unwrap_or(Value::Null);
                            if let Value::Object(map) = &mut updated {
                                map.insert("id".to_string(), json!(id));
                            }
                            *slot = updated.clone();
                            return Ok(updated);
                        }
                    }
                    return Err(self.error(method, path, body, 404));
                }
                let doc = body.cloned().unwrap_or(Value::Null);
                self.documents
                    .borrow_mut()
                    .insert(path.to_string(), doc.clone());
                Ok(doc)
            }
            Method::Delete => {
                if let Some((collection, id)) = split_id(path) {
                    let mut collections = self.collections.borrow_mut();
                    let records = collections.entry(collection.to_string()).or_default();
                    let before = records.len();
                    records.retain(|r| r.get("id").and_then(Value::as_i64) != Some(id));
                    if records.len() == before {
                        return Err(self.error(method, path, body, 404));
                    }
                }
                Ok(Value::Null)
            }
        }
    }
}
