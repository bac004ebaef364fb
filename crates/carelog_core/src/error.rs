//! Error types for the carelog core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in changelog and capture operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A change entry is missing a required field.
    ///
    /// Raised synchronously by the insertion gateway; the whole batch is
    /// rejected and nothing is inserted.
    #[error("malformed change entry: {message}")]
    MalformedEntry {
        /// Description of the missing or invalid field.
        message: String,
    },

    /// Operation not permitted in the current transaction state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A constraint violation aborted the owning transaction.
    ///
    /// Staged changelog entries from that transaction are discarded with it.
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violated constraint.
        message: String,
    },

    /// Row snapshot could not be serialized to canonical text.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates a malformed-entry error.
    pub fn malformed_entry(message: impl Into<String>) -> Self {
        Self::MalformedEntry {
            message: message.into(),
        }
    }

    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a constraint-violation error.
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::malformed_entry("record_id is empty");
        assert_eq!(err.to_string(), "malformed change entry: record_id is empty");

        let err = CoreError::invalid_operation("transaction already committed");
        assert!(err.to_string().contains("already committed"));
    }
}
