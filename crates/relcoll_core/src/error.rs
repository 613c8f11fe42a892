//! Error types for collection operations.

use std::error::Error as StdError;
use thiserror::Error;

/// Result type for collection operations.
pub type CollResult<T> = Result<T, CollError>;

/// Errors surfaced by collections, views and transaction runners.
///
/// Backend-specific failures are normalised into this enum once, at the
/// backend boundary. Callers branch on [`is_not_found`] and
/// [`is_already_exists`] rather than inspecting driver errors.
#[derive(Debug, Error)]
pub enum CollError {
    /// No row with the given key (or matching the handle's filters).
    #[error("{key} not found in {table}")]
    NotFound {
        /// Table that was searched.
        table: String,
        /// Key that was looked up.
        key: String,
    },

    /// A row with the given primary key already exists.
    #[error("{key} already exists in {table}")]
    AlreadyExists {
        /// Table written to.
        table: String,
        /// Conflicting key.
        key: String,
    },

    /// The backend does not offer an optional capability.
    #[error("{operation} is not supported on {backend} collections")]
    Unsupported {
        /// The rejected operation.
        operation: &'static str,
        /// Name of the backend.
        backend: &'static str,
    },

    /// Invalid model descriptor or request shape, detected before any I/O.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// Opaque backend failure. Eligible for transaction retry.
    #[error("store error: {context}")]
    Store {
        /// What was being attempted.
        context: String,
        /// The backend error.
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    /// Row encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] relcoll_codec::CodecError),

    /// The read context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The read context's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Every transaction attempt failed.
    #[error("transaction rolled back too many times: [{}]", attempts.join("; "))]
    TransactionRetriesExhausted {
        /// The error of each attempt, in order.
        attempts: Vec<String>,
    },

    /// Another caller holds the claim on this key.
    #[error("{key} in {table} is already claimed")]
    Claimed {
        /// Table of the claimed key.
        table: String,
        /// Claimed key.
        key: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },
}

impl CollError {
    /// Creates a not-found error.
    pub fn not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates an already-exists error.
    pub fn already_exists(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(operation: &'static str, backend: &'static str) -> Self {
        Self::Unsupported { operation, backend }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps a backend error with context.
    pub fn store<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Store {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// True for [`CollError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for [`CollError::AlreadyExists`].
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// True for [`CollError::Unsupported`].
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Whether a transaction runner should try again after this error.
    ///
    /// Only opaque store failures qualify. Domain outcomes are final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

/// Returns true if `err` reports a missing row.
#[must_use]
pub fn is_not_found(err: &CollError) -> bool {
    err.is_not_found()
}

/// Returns true if `err` reports a primary-key conflict.
#[must_use]
pub fn is_already_exists(err: &CollError) -> bool {
    err.is_already_exists()
}

/// Returns true if `err` reports an unsupported optional capability.
#[must_use]
pub fn is_unsupported(err: &CollError) -> bool {
    err.is_unsupported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn domain_errors_format_with_context() {
        let err = CollError::not_found("files", "f1");
        assert_eq!(err.to_string(), "f1 not found in files");
        assert!(is_not_found(&err));
        assert!(!is_already_exists(&err));

        let err = CollError::already_exists("files", "f1");
        assert_eq!(err.to_string(), "f1 already exists in files");
        assert!(is_already_exists(&err));
    }

    #[test]
    fn only_store_errors_are_retryable() {
        let store = CollError::store("insert", io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(store.is_retryable());
        assert!(StdError::source(&store).is_some());

        assert!(!CollError::not_found("t", "k").is_retryable());
        assert!(!CollError::unsupported("watch", "sqlite").is_retryable());
        assert!(!CollError::Cancelled.is_retryable());
    }

    #[test]
    fn exhausted_lists_attempts() {
        let err = CollError::TransactionRetriesExhausted {
            attempts: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "transaction rolled back too many times: [a; b]"
        );
    }

    #[test]
    fn unsupported_names_backend() {
        let err = CollError::unsupported("claim", "sqlite");
        assert!(is_unsupported(&err));
        assert_eq!(err.to_string(), "claim is not supported on sqlite collections");
    }
}
