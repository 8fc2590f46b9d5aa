//! Collection descriptors.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reserved record key holding the store-generated internal identifier.
pub const INTERNAL_ID_FIELD: &str = "__id__";

/// Static description of one collection: its name, the record field used as
/// the business key, and the JSON file backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name, as it appears in request paths.
    pub name: String,
    /// Record field whose value addresses a record within the collection.
    pub identity_field: String,
    /// Backing data file.
    pub path: PathBuf,
}

impl CollectionSchema {
    /// Describe a collection.
    pub fn new(
        name: impl Into<String>,
        identity_field: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Self {
        Self {
            name: name.into(),
            identity_field: identity_field.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reject descriptors the store can't work with.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("collection name is empty".into()));
        }
        if self.identity_field.is_empty() {
            return Err(Error::Config(format!(
                "collection '{}' has an empty identity field",
                self.name
            )));
        }
        if self.identity_field == INTERNAL_ID_FIELD {
            return Err(Error::Config(format!(
                "collection '{}' can't use the reserved field '{INTERNAL_ID_FIELD}' as identity",
                self.name
            )));
        }
        if self.path.as_os_str().is_empty() {
            return Err(Error::Config(format!(
                "collection '{}' has an empty data file path",
                self.name
            )));
        }
        Ok(())
    }
}

/// Parse a JSON array of schemas, e.g. from a config file:
///
/// ```json
/// [{"name": "users", "identity_field": "email", "path": "data/users.json"}]
/// ```
///
/// Every entry is validated.
pub fn parse_schema_list(bytes: &[u8]) -> Result<Vec<CollectionSchema>> {
    let schemas: Vec<CollectionSchema> =
        serde_json::from_slice(bytes).map_err(|e| Error::Config(e.to_string()))?;
    for schema in &schemas {
        schema.validate()?;
    }
    Ok(schemas)
}
