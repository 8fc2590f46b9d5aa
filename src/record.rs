//! Records and the helpers that read their identity fields.

use crate::error::{Error, Result};
use crate::schema::INTERNAL_ID_FIELD;
use serde_json::Value;

/// A single JSON object stored in a collection.
pub type Record = serde_json::Map<String, Value>;

/// Map key for a record: the identity field's value, as text.
///
/// Strings are used verbatim; numbers and booleans use their JSON text. Null,
/// arrays and objects can't address a record.
pub fn identity_key(record: &Record, identity_field: &str) -> Result<String> {
    match record.get(identity_field) {
        None => Err(Error::Validation(format!(
            "missing identity field '{identity_field}'"
        ))),
        Some(value) => key_for_value(value).ok_or_else(|| {
            Error::Validation(format!(
                "identity field '{identity_field}' must be a string, number or bool"
            ))
        }),
    }
}

/// Same rules as [`identity_key`] for a bare value.
pub fn key_for_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// The record's internal id. `Ok(None)` when absent, an error when present
/// but not a string.
pub fn internal_id(record: &Record) -> Result<Option<&str>> {
    match record.get(INTERNAL_ID_FIELD) {
        None => Ok(None),
        Some(Value::String(id)) => Ok(Some(id.as_str())),
        Some(_) => Err(Error::Validation(format!(
            "'{INTERNAL_ID_FIELD}' must be a string"
        ))),
    }
}

/// Fresh internal id (UUID v4).
pub fn generate_internal_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Attach `id` as the record's internal id, replacing any previous one.
pub fn set_internal_id(record: &mut Record, id: impl Into<String>) {
    record.insert(INTERNAL_ID_FIELD.to_string(), Value::String(id.into()));
}
