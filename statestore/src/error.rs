//! Error types for the state store.

use thiserror::Error;

/// Every variant records the operation name, so a caller can build a
/// `StorageFault` naming what failed without re-deriving it from a string.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op}: not found: {id}")]
    NotFound { op: &'static str, id: String },

    #[error("{op}: conflict: {reason}")]
    Conflict { op: &'static str, reason: String },

    #[error("{op}: io error: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: serialization error: {source}")]
    Serialization {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{op}: sql error: {source}")]
    Sql {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{op}: transaction aborted: {reason}")]
    TransactionAborted { op: &'static str, reason: String },

    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument { op: &'static str, reason: String },
}

impl StoreError {
    pub fn not_found(op: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound { op, id: id.into() }
    }

    pub fn conflict(op: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Conflict {
            op,
            reason: reason.into(),
        }
    }

    pub fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        StoreError::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }

    pub fn sql(op: &'static str, source: rusqlite::Error) -> Self {
        StoreError::Sql { op, source }
    }

    pub fn serialization(op: &'static str, source: serde_json::Error) -> Self {
        StoreError::Serialization { op, source }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(source: rusqlite::Error) -> Self {
        StoreError::Sql {
            op: "row_conversion",
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
