//! Unified error type for all store operations.

/// Things that can go wrong when using the store.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Payload is missing a required field or is not shaped like a record.
    Validation(String),
    /// Identity key already belongs to a record with a different internal id.
    Conflict(String),
    /// Unknown collection, unknown record, or an empty id where one is needed.
    NotFound(String),
    /// HTTP verb the store has no operation for.
    MethodNotAllowed(String),
    /// File system problem (read, write, rename).
    Io(String),
    /// Failed to serialize a collection to bytes.
    Serialize(String),
    /// Failed to deserialize bytes back into a collection.
    Deserialize(String),
    /// Bad configuration (invalid schema, path, etc.).
    Config(String),
}

impl Error {
    /// HTTP status the boundary adapter answers with for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Conflict(_) => 400,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::Io(_) | Error::Serialize(_) | Error::Deserialize(_) | Error::Config(_) => 500,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "validation error: {msg}"),
            Error::Conflict(msg) => write!(f, "conflict: {msg}"),
            Error::NotFound(msg) => write!(f, "not found: {msg}"),
            Error::MethodNotAllowed(msg) => write!(f, "method not allowed: {msg}"),
            Error::Io(msg) => write!(f, "i/o error: {msg}"),
            Error::Serialize(msg) => write!(f, "serialization error: {msg}"),
            Error::Deserialize(msg) => write!(f, "deserialization error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.to_string())
        } else if err.is_syntax() || err.is_eof() || err.is_data() {
            Error::Deserialize(err.to_string())
        } else {
            Error::Serialize(err.to_string())
        }
    }
}

/// Result alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
