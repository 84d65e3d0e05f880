//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or interpreting wire data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record payload did not have the expected shape.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// A table name outside the known set.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// An operation could not be applied to a record.
    #[error("invalid operation path {path:?}: {message}")]
    InvalidPath {
        /// The offending path.
        path: Vec<String>,
        /// Description of the problem.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: &[String], message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_vec(),
            message: message.into(),
        }
    }
}
