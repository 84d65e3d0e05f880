//! Error types for the engine.

use crate::stack::OperationStack;
use docgraph_protocol::{Pointer, ProtocolError, Table};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while staging, flushing or loading.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// Encoding, decoding or record shape error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server rejected the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// An entity the call depends on is not in the cache.
    #[error("record not cached: {pointer}")]
    MissingRecord {
        /// Address of the missing entity.
        pointer: Pointer,
    },

    /// The entity has no child relation the call could use.
    #[error("no child relation for {pointer}")]
    NoRelation {
        /// Address of the parent entity.
        pointer: Pointer,
    },

    /// The call only applies to another table.
    #[error("expected a {expected} entity, got {pointer}")]
    WrongTable {
        /// Table the call requires.
        expected: Table,
        /// Address of the entity it was given.
        pointer: Pointer,
    },

    /// Invalid stack state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// A flush stopped partway. `remaining` holds every operation that
    /// was not acknowledged, ready to be executed again.
    #[error("flush failed after {sent} operations: {source}")]
    FlushFailed {
        /// Operations delivered before the failure.
        sent: usize,
        /// Unsent remainder of the stack.
        remaining: Box<OperationStack>,
        /// The send failure.
        source: Box<EngineError>,
    },

    /// Operations were delivered but the follow-up refresh failed.
    #[error("refresh of {} records failed: {source}", records.len())]
    RefreshFailed {
        /// Entities whose cached copy may be stale.
        records: Vec<Pointer>,
        /// The fetch failure.
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a missing record error.
    pub fn missing(table: Table, id: impl Into<String>) -> Self {
        Self::MissingRecord {
            pointer: Pointer::new(table, id),
        }
    }

    /// Returns true if resubmitting the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            EngineError::Timeout => true,
            EngineError::ServerError(_) => true,
            EngineError::FlushFailed { source, .. } | EngineError::RefreshFailed { source, .. } => {
                source.is_retryable()
            }
            _ => false,
        }
    }

    /// Takes the unsent remainder out of a flush failure.
    pub fn into_remaining(self) -> Option<OperationStack> {
        match self {
            EngineError::FlushFailed { remaining, .. } => Some(*remaining),
            _ => None,
        }
    }
}
