//! Unified error type for query validation and store access.

/// Index error type.
///
/// Validation errors are caller errors and are never retried. Database
/// errors are surfaced unchanged; retry policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Check if this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error was caused by an invalid request.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Shorthand for building a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Log the error at the level matching its kind and return it.
    pub fn logged(self) -> Self {
        match &self {
            IndexError::Database(e) => tracing::error!(error = %e, "Database error"),
            IndexError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
            IndexError::Validation(msg) => tracing::debug!(error = %msg, "Rejected query"),
            IndexError::NotFound(msg) => tracing::debug!(error = %msg, "Not found"),
        }
        self
    }
}
