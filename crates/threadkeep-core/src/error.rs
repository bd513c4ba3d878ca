//! Error types for Threadkeep.

use thiserror::Error;

/// A shared error type for every Threadkeep crate.
///
/// `NotFound` and `InvalidOperation` are precondition failures reported to the
/// caller. `StorageExhausted` is kept apart from `Io` so callers can warn the
/// user about a full medium without treating the data as corrupt.
#[derive(Error, Debug, Clone)]
pub enum ThreadkeepError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Forbidden transition (e.g. archiving or deleting the main thread)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The storage medium rejected a write because it is out of space
    #[error("Storage exhausted while writing '{key}': {message}")]
    StorageExhausted { key: String, message: String },

    /// Directory and runtime registry disagree in a way that cannot be healed
    #[error("Fatal inconsistency for thread '{id}': {message}")]
    FatalInconsistency { id: String, message: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ThreadkeepError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an InvalidOperation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Creates a StorageExhausted error
    pub fn storage_exhausted(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageExhausted {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a FatalInconsistency error
    pub fn fatal_inconsistency(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FatalInconsistency {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an InvalidOperation error
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }

    /// Check if this is a StorageExhausted error
    pub fn is_storage_exhausted(&self) -> bool {
        matches!(self, Self::StorageExhausted { .. })
    }

    /// Check if this is a FatalInconsistency error
    pub fn is_fatal_inconsistency(&self) -> bool {
        matches!(self, Self::FatalInconsistency { .. })
    }

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Maps an I/O error raised while writing `key`.
    ///
    /// Out-of-space and quota errors become `StorageExhausted`; anything else
    /// becomes a plain `Io` error.
    pub fn from_write_error(key: &str, err: std::io::Error) -> Self {
        if is_capacity_error(&err) {
            Self::storage_exhausted(key, err.to_string())
        } else {
            Self::from(err)
        }
    }
}

/// Returns true when the medium refused a write for lack of space.
pub fn is_capacity_error(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::StorageFull | ErrorKind::FileTooLarge => true,
        // ENOSPC / EDQUOT on platforms that report them uncategorised
        _ => cfg!(unix) && matches!(err.raw_os_error(), Some(28) | Some(122)),
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ThreadkeepError {
    fn from(err: std::io::Error) -> Self {
        if is_capacity_error(&err) {
            return Self::StorageExhausted {
                key: String::new(),
                message: err.to_string(),
            };
        }
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ThreadkeepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ThreadkeepError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ThreadkeepError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, ThreadkeepError>`.
pub type Result<T> = std::result::Result<T, ThreadkeepError>;
