//! Serialization layer. Defaults to JSON via serde_json.
//!
//! Implement [`Serializer`] if you need a different on-disk format.

use crate::collection::CollectionState;
use crate::error::{Error, Result};

/// Converts collection snapshots to/from bytes for persistence.
pub trait Serializer: Send + Sync {
    /// Encode a collection to bytes.
    fn serialize(&self, state: &CollectionState) -> Result<Vec<u8>>;

    /// Decode bytes back into a collection.
    fn deserialize(&self, bytes: &[u8]) -> Result<CollectionState>;
}

/// JSON serializer with optional pretty-printing.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON (single line, no extra whitespace).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON with indentation, easier to read by hand.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, state: &CollectionState) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(state)
        } else {
            serde_json::to_vec(state)
        };
        bytes.map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CollectionState> {
        serde_json::from_slice(bytes).map_err(Error::from)
    }
}
