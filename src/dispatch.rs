//! Translation between HTTP-shaped requests and store operations.
//!
//! The HTTP server itself lives outside this crate. An adapter turns each
//! inbound call into a [`Request`], passes it to [`dispatch`], and writes the
//! returned [`Response`] back out.
//!
//! | method | entry id | operation | success |
//! |---|---|---|---|
//! | GET | absent | `list_all` / `filter_by_field` | 200 |
//! | GET | present | `find_by_id` | 200 |
//! | POST | - | `upsert` / `batch_upsert` | 200 |
//! | PUT | absent | `upsert` / `batch_upsert` | 200 |
//! | PUT | present | `update_by_id` | 200 |
//! | DELETE | present | `delete_by_id` | 200 |

use crate::error::{Error, Result};
use crate::record::Record;
use crate::store::RecordStore;
use serde_json::{json, Value};
use std::str::FromStr;

/// Content type of every JSON body produced here.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP verbs the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read a collection or a single record.
    Get,
    /// Create or replace by identity field.
    Post,
    /// Same as POST without an entry id, update-by-id with one.
    Put,
    /// Remove by internal id.
    Delete,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::MethodNotAllowed(other.to_string())),
        }
    }
}

/// One inbound call: `METHOD /<collection>[/<entry_id>]` plus an optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP verb.
    pub method: Method,
    /// Target collection name.
    pub collection: String,
    /// Internal id from the path, if any.
    pub entry_id: Option<String>,
    /// Raw request body.
    pub body: Option<Vec<u8>>,
    /// Exact-match filter `(field, value)` for listing, from the query string.
    pub filter: Option<(String, String)>,
}

impl Request {
    /// Request without id, body or filter.
    pub fn new(method: Method, collection: impl Into<String>) -> Self {
        Self {
            method,
            collection: collection.into(),
            entry_id: None,
            body: None,
            filter: None,
        }
    }

    /// Set the entry id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.entry_id = Some(id.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Only list records whose `field` equals `value`.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }
}

/// What to send back: status, and a JSON body when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// JSON body bytes.
    pub body: Option<Vec<u8>>,
    /// Always [`JSON_CONTENT_TYPE`] when `body` is set.
    pub content_type: Option<&'static str>,
}

impl Response {
    /// Status with a JSON body.
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            body: Some(value.to_string().into_bytes()),
            content_type: Some(JSON_CONTENT_TYPE),
        }
    }

    /// Status without a body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: None,
            content_type: None,
        }
    }

    /// `{"error": ...}` with the status mapped from `err`.
    pub fn error(err: &Error) -> Self {
        Self::json(err.status_code(), &error_value(err))
    }

    /// Parsed body, if it is valid JSON.
    #[must_use]
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}

/// Run `request` against `store`. Never fails: every error becomes a status.
pub fn dispatch(store: &RecordStore, request: &Request) -> Response {
    match handle(store, request) {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!(
                "{:?} /{} -> {}: {}",
                request.method,
                request.collection,
                e.status_code(),
                e
            );
            Response::error(&e)
        }
    }
}

fn handle(store: &RecordStore, req: &Request) -> Result<Response> {
    let collection = req.collection.as_str();
    if store.schema(collection).is_none() {
        return Err(Error::NotFound(format!("unknown collection '{collection}'")));
    }
    let id = req.entry_id.as_deref();

    match (req.method, id) {
        (Method::Get, Some(id)) if !id.is_empty() => match store.find_by_id(collection, id)? {
            Some(rec) => Ok(Response::json(200, &Value::Object(rec))),
            None => Err(Error::NotFound(format!("no record with id '{id}'"))),
        },
        (Method::Get, _) => {
            let records = match &req.filter {
                Some((field, raw)) => {
                    store.filter_by_field(collection, field, &filter_value(raw))?
                }
                None => store.list_all(collection)?,
            };
            Ok(Response::json(200, &records_value(records)))
        }
        (Method::Put, Some(id)) => {
            let rec = match parse_body(req)? {
                Value::Object(rec) => rec,
                _ => return Err(Error::Validation("body must be a JSON object".into())),
            };
            let stored = store.update_by_id(collection, id, rec)?;
            Ok(Response::json(200, &Value::Object(stored)))
        }
        (Method::Post | Method::Put, _) => write_body(store, collection, parse_body(req)?),
        (Method::Delete, Some(id)) => {
            store.delete_by_id(collection, id)?;
            Ok(Response::empty(200))
        }
        (Method::Delete, None) => Err(Error::NotFound("missing entry id".into())),
    }
}

fn write_body(store: &RecordStore, collection: &str, body: Value) -> Result<Response> {
    match body {
        Value::Object(rec) => {
            let stored = store.upsert(collection, rec)?;
            Ok(Response::json(200, &Value::Object(stored)))
        }
        Value::Array(items) => {
            let parsed = items.into_iter().map(|item| match item {
                Value::Object(rec) => Ok(rec),
                _ => Err(Error::Validation("batch element is not a JSON object".into())),
            });
            let results: Vec<Value> = store
                .batch_upsert_parsed(collection, parsed)?
                .into_iter()
                .map(|outcome| match outcome {
                    Ok(rec) => Value::Object(rec),
                    Err(e) => error_value(&e),
                })
                .collect();
            Ok(Response::json(200, &Value::Array(results)))
        }
        _ => Err(Error::Validation(
            "body must be a JSON object or array".into(),
        )),
    }
}

fn parse_body(req: &Request) -> Result<Value> {
    match req.body.as_deref() {
        None | Some([]) => Err(Error::Validation("missing request body".into())),
        Some(bytes) => serde_json::from_slice(bytes)
            .map_err(|e| Error::Validation(format!("malformed JSON body: {e}"))),
    }
}

// `?age=42` compares as a number, `?name=bob` as a string.
fn filter_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
        _ => Value::String(raw.to_string()),
    }
}

fn records_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

fn error_value(err: &Error) -> Value {
    json!({ "error": err.to_string() })
}
