//! Error types for the Tabula table store.
//!
//! All public APIs return `TabulaResult<T>` — no panics in library code.

use crate::index::IndexType;
use thiserror::Error;

/// Unified error type for all table operations.
#[derive(Debug, Error)]
pub enum TabulaError {
    /// Requested key does not exist
    #[error("key not found")]
    KeyNotFound,

    /// The table handle was closed; it stays closed
    #[error("table handle is closed")]
    ClosedHandle,

    /// Mutation attempted on a handle opened with `OpenMode::Read`
    #[error("table is opened read-only")]
    ReadOnly,

    /// Column already carries an index of a different type
    #[error("index conflict on column '{column}': existing {existing}, requested {requested}")]
    IndexConflict {
        column: String,
        existing: IndexType,
        requested: IndexType,
    },

    /// No index is declared on the column
    #[error("index not found on column '{column}'")]
    IndexNotFound { column: String },

    /// Value handed to `put` is not a column mapping
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// `matches` pattern failed to compile
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Order directive could not be parsed
    #[error("invalid order directive: '{0}'")]
    InvalidOrder(String),

    /// Invalid operation
    #[error("invalid operation: {message}\nContext: {context}")]
    InvalidOperation { message: String, context: String },

    /// Stored bytes could not be decoded
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage layer error
    #[error("storage error: {0}")]
    Storage(String),

    /// sled embedded database error
    #[error("sled error: {source}")]
    Sled {
        #[from]
        source: sled::Error,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for all table operations.
pub type TabulaResult<T> = Result<T, TabulaError>;

impl From<serde_json::Error> for TabulaError {
    fn from(err: serde_json::Error) -> Self {
        TabulaError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for TabulaError {
    fn from(err: bincode::Error) -> Self {
        TabulaError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_key_not_found() {
        assert_eq!(TabulaError::KeyNotFound.to_string(), "key not found");
    }

    #[test]
    fn error_display_index_conflict() {
        let err = TabulaError::IndexConflict {
            column: "age".to_string(),
            existing: IndexType::Decimal,
            requested: IndexType::Lexical,
        };
        assert_eq!(
            err.to_string(),
            "index conflict on column 'age': existing decimal, requested lexical"
        );
    }

    #[test]
    fn error_display_invalid_pattern() {
        let err = TabulaError::InvalidPattern {
            pattern: "(".to_string(),
            message: "unclosed group".to_string(),
        };
        assert!(err.to_string().contains("invalid pattern '('"));
        assert!(err.to_string().contains("unclosed group"));
    }

    #[test]
    fn error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: TabulaError = json_err.into();
        assert!(matches!(err, TabulaError::Serialization(_)));
    }

    #[test]
    fn tabula_result_err() {
        let result: TabulaResult<i32> = Err(TabulaError::ClosedHandle);
        assert!(result.is_err());
    }
}
