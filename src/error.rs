//! Forge Memory error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Forge Memory error type
#[derive(Error, Debug)]
pub enum Error {
    /// Backing medium cannot be created or written (fatal to the session)
    #[error("Storage unavailable at {path}: {source}")]
    StorageUnavailable {
        /// Path that could not be created or written
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Category does not exist and was not requested for creation
    #[error("Category '{category}' not found in project '{project}'")]
    CategoryNotFound {
        /// Project the lookup was made in
        project: String,
        /// Requested category
        category: String,
    },

    /// Document does not exist in its category
    #[error("Document '{document}' not found in category '{category}'")]
    DocumentNotFound {
        /// Category the lookup was made in
        category: String,
        /// Requested document
        document: String,
    },

    /// Atomic replace did not complete; prior content is intact
    #[error("Write failed for {path}: {source}")]
    WriteFailed {
        /// Document path whose write failed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Per-document lock was not acquired within the caller's timeout
    #[error("Timed out after {waited:?} waiting for lock on {path}")]
    LockTimeout {
        /// Document path that was contended
        path: PathBuf,
        /// How long the caller waited
        waited: Duration,
    },

    /// Name would escape its directory or collide with internal files
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the caller used a key that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::CategoryNotFound { .. } | Error::DocumentNotFound { .. }
        )
    }

    /// Whether retrying (with backoff) may succeed. Only lock contention is
    /// transient; the retry policy itself belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockTimeout { .. })
    }
}

/// Result type alias for Forge Memory operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        let err = Error::DocumentNotFound {
            category: "incidents".to_string(),
            document: "outage".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        let err = Error::CategoryNotFound {
            project: "checkout-api".to_string(),
            category: "scratch".to_string(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_only_lock_timeout_is_retryable() {
        let timeout = Error::LockTimeout {
            path: PathBuf::from("/tmp/doc"),
            waited: Duration::from_millis(50),
        };
        assert!(timeout.is_retryable());

        let failed = Error::WriteFailed {
            path: PathBuf::from("/tmp/doc"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(!failed.is_retryable());
        assert!(!failed.is_not_found());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::CategoryNotFound {
            project: "checkout-api".to_string(),
            category: "scratch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Category 'scratch' not found in project 'checkout-api'"
        );

        let err = Error::InvalidName("..".to_string());
        assert!(err.to_string().contains("Invalid name"));
    }
}
