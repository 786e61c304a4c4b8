//! Error types for serialbox
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every failure the engine can report is a distinct variant so that callers
//! (and binding layers) can match on it. Nothing is swallowed.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for serialbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the serialization engine
#[derive(Debug, Error)]
pub enum Error {
    /// Operation not legal in the current open/closed/mode state
    #[error("Invalid state: cannot {operation} while serializer is {state}")]
    InvalidState {
        /// Operation that was attempted
        operation: &'static str,
        /// State the serializer was in
        state: String,
    },

    /// Field re-registered or written with an incompatible shape/type
    #[error("Type mismatch for field '{field}': registered as {expected}, got {actual}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Registered description
        expected: String,
        /// Offending description
        actual: String,
    },

    /// Same field written twice at one savepoint
    #[error("Field '{field}' already written at savepoint {savepoint}")]
    DuplicateFieldAtSavepoint {
        /// Savepoint display form
        savepoint: String,
        /// Field name
        field: String,
    },

    /// Byte or element count disagrees with the declared field size
    #[error("Size mismatch for field '{field}': expected {expected}, got {actual}")]
    SizeMismatch {
        /// Field name
        field: String,
        /// Declared size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Field not present at the savepoint (primary and reference archives)
    #[error("Field '{field}' not found at savepoint {savepoint}")]
    FieldNotFound {
        /// Savepoint display form
        savepoint: String,
        /// Field name
        field: String,
    },

    /// Savepoint unknown to the archive
    #[error("Savepoint not found: {0}")]
    SavepointNotFound(String),

    /// Archive files missing when opening for read
    #[error("Archive not found at {path}")]
    ArchiveNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Archive location cannot be created or opened for writing
    #[error("Archive not writable at {path}: {source}")]
    ArchiveUnwritable {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Metadata file fails to parse or references data that does not exist
    #[error("Corrupt metadata: {0}")]
    CorruptMetadata(String),

    /// Metainfo key not present
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Caller supplied an inconsistent argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be read or parsed
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create an `InvalidState` error.
    pub fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        Error::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Create a `CorruptMetadata` error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Error::CorruptMetadata(detail.into())
    }

    /// Create an `InvalidArgument` error.
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Error::InvalidArgument(detail.into())
    }

    /// True for read misses (`FieldNotFound` / `SavepointNotFound`).
    ///
    /// The serializer uses this to decide whether a reference archive
    /// should be consulted.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::FieldNotFound { .. } | Error::SavepointNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_state() {
        let err = Error::invalid_state("read a field", "open for write");
        let msg = err.to_string();
        assert!(msg.contains("Invalid state"));
        assert!(msg.contains("read a field"));
        assert!(msg.contains("open for write"));
    }

    #[test]
    fn test_error_display_type_mismatch() {
        let err = Error::TypeMismatch {
            field: "pt".to_string(),
            expected: "float64[3, 3]".to_string(),
            actual: "float64[4, 4]".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pt"));
        assert!(msg.contains("[3, 3]"));
        assert!(msg.contains("[4, 4]"));
    }

    #[test]
    fn test_error_display_size_mismatch() {
        let err = Error::SizeMismatch {
            field: "u".to_string(),
            expected: 72,
            actual: 64,
        };
        let msg = err.to_string();
        assert!(msg.contains("72"));
        assert!(msg.contains("64"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_archive_unwritable_keeps_source() {
        let err = Error::ArchiveUnwritable {
            path: PathBuf::from("/readonly/archive"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/readonly/archive"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::SavepointNotFound("s".into()).is_not_found());
        assert!(Error::FieldNotFound {
            savepoint: "s".into(),
            field: "f".into()
        }
        .is_not_found());
        assert!(!Error::corrupt("bad").is_not_found());
        assert!(!Error::KeyNotFound("k".into()).is_not_found());
    }
}
