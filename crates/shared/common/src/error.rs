//! Unified error handling for the document store client.
//!
//! Every failure surfaced by the store seam, the query compiler, the batch
//! executor or configuration loading is an [`AppError`]. The variants are
//! grouped by how callers should react: transient failures are absorbed by
//! the retry policy, everything else propagates on first occurrence.

use std::time::Duration;

use domain::DomainError;
use thiserror::Error;

use crate::constants::*;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Access denied: {0}")]
    Unauthorized(String),

    #[error("Store server error: {0}")]
    Server(String),

    // Transient store failures
    #[error("Too many requests: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Resource gone: {0}")]
    Gone(String),

    #[error("Retry with: {0}")]
    RetryWith(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    // Usage errors
    #[error("Unsupported query expression: {0}")]
    Compilation(String),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Configuration(Vec<String>),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("{0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get a stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Gone(_) => "GONE",
            AppError::RetryWith(_) => "RETRY_WITH",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Compilation(_) => "COMPILATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::InvalidBatch(_) => "INVALID_BATCH",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Cancelled => "CANCELLED",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure may succeed if the same request is sent again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. }
                | AppError::Timeout(_)
                | AppError::Gone(_)
                | AppError::RetryWith(_)
                | AppError::ServiceUnavailable(_)
                | AppError::Transport(_)
        )
    }

    /// Whether the failure was reported by (or on the way to) the store,
    /// as opposed to a local usage or programming error.
    pub fn is_store_failure(&self) -> bool {
        self.is_transient()
            || matches!(
                self,
                AppError::NotFound(_)
                    | AppError::Conflict(_)
                    | AppError::PayloadTooLarge(_)
                    | AppError::Unauthorized(_)
                    | AppError::Server(_)
            )
    }

    /// Server-specified minimum wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Classify a store response status code.
    ///
    /// Store adapters call this so every failure is classified the same way
    /// regardless of which client produced it.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            400 => AppError::Validation(message),
            401 | 403 => AppError::Unauthorized(message),
            STATUS_NOT_FOUND => AppError::NotFound(message),
            STATUS_REQUEST_TIMEOUT | 504 => AppError::Timeout(message),
            STATUS_CONFLICT | STATUS_PRECONDITION_FAILED => AppError::Conflict(message),
            STATUS_GONE => AppError::Gone(message),
            STATUS_ENTITY_TOO_LARGE => AppError::PayloadTooLarge(message),
            STATUS_TOO_MANY_REQUESTS => AppError::RateLimited {
                message,
                retry_after,
            },
            STATUS_RETRY_WITH => AppError::RetryWith(message),
            STATUS_INTERNAL_SERVER_ERROR => AppError::Server(message),
            STATUS_SERVICE_UNAVAILABLE => AppError::ServiceUnavailable(message),
            s if s > STATUS_INTERNAL_SERVER_ERROR => AppError::ServiceUnavailable(message),
            _ => AppError::Internal(format!("unexpected status {}: {}", status, message)),
        }
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::UnmappedDocumentType(_) | DomainError::InvalidPartitionKeyPath(_) => {
                AppError::Configuration(vec![err.to_string()])
            }
            DomainError::InvalidDocument(msg) => AppError::Validation(msg),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn compilation(msg: impl Into<String>) -> Self {
        AppError::Compilation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(vec![msg.into()])
    }

    pub fn invalid_batch(msg: impl Into<String>) -> Self {
        AppError::InvalidBatch(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<Duration>) -> Self {
        AppError::RateLimited {
            message: msg.into(),
            retry_after,
        }
    }
}
