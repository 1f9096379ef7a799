//! Error types for the render bridge.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bridge operations.
///
/// Decode and resource faults inside a scene or material payload are not
/// surfaced through this type; they are logged and the offending element is
/// skipped. `Error` covers what callers have to act on.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Blob or record is truncated
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in a file or payload
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// Transport latched a fault; reconnect required
    #[error("Transport faulted")]
    TransportFaulted,

    /// Peer violated the control protocol (zero dimensions, bad sizes)
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// No compute device matches the requested selection
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Node type name not present in the registry
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Type mismatch when reading or assigning a value
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Index (JSON) parse or write error
    #[error("Index format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a protocol violation error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Map an `open` failure to `FileNotFound` when appropriate.
    pub fn from_open(path: impl Into<PathBuf>, e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.into())
        } else {
            Self::Io(e)
        }
    }

    /// True for errors that mean the link is gone and must be rebuilt.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::TransportFaulted | Self::Protocol(_) | Self::Io(_))
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
