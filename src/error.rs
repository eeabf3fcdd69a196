//! Error types for resume-ingest
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Batch, Ingest, Database, etc.)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//! - Context information (batch ID, file ID, status, etc.)

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for resume-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for resume-ingest
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "chunk_size")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Batch lifecycle error
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    /// Task queue error
    #[error("task queue error: {0}")]
    Queue(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// A JSON column held a value the row type cannot represent
    #[error("corrupt column data: {0}")]
    CorruptColumn(String),
}

/// Batch lifecycle errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// Batch not found in database
    #[error("batch {id} not found")]
    NotFound {
        /// The batch ID that was not found
        id: i64,
    },

    /// A batch must contain at least one file id
    #[error("batch must contain at least one file id")]
    EmptyFileList,

    /// The batch already reached a terminal state and is immutable
    #[error("batch {id} is already terminal ({status})")]
    AlreadyTerminal {
        /// The batch ID that is terminal
        id: i64,
        /// The terminal status the batch is in
        status: String,
    },

    /// The batch is not in a state the operation accepts
    #[error("cannot {operation} batch {id} in state {current_state}")]
    InvalidState {
        /// The batch ID that is in an invalid state for the operation
        id: i64,
        /// The operation that was attempted (e.g., "run")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },
}

/// Per-item ingest failures
///
/// These never escape the worker pool as errors: every variant is converted
/// into a failed [`crate::types::FileOutcome`]. The enum exists so that the
/// collaborator traits have a typed error surface and the outcome message
/// stays consistent.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The remote store could not deliver the file
    #[error("download failed: {0}")]
    Download(String),

    /// The file's content type is not in the allow-list
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The parser rejected the file content
    #[error("parse failed: {0}")]
    Parse(String),

    /// The per-item deadline expired
    #[error("timeout")]
    Timeout,
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "batch_not_found",
///     "message": "batch 123 not found",
///     "details": {
///       "batch_id": 123
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "batch_not_found", "validation_error")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    ///
    /// This can include fields like batch_id, owner_id, validation errors, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Batch(BatchError::NotFound { .. }) => 404,

            // 409 Conflict - Resource state forbids the operation
            Error::Batch(BatchError::AlreadyTerminal { .. }) => 409,
            Error::Batch(BatchError::InvalidState { .. }) => 409,

            // 422 Unprocessable Entity - Semantic errors
            Error::Batch(BatchError::EmptyFileList) => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,
            Error::Queue(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Batch(e) => match e {
                BatchError::NotFound { .. } => "batch_not_found",
                BatchError::EmptyFileList => "empty_file_list",
                BatchError::AlreadyTerminal { .. } => "batch_terminal",
                BatchError::InvalidState { .. } => "invalid_state",
            },
            Error::Queue(_) => "queue_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::Batch(BatchError::NotFound { id }) => Some(serde_json::json!({
                "batch_id": id,
            })),
            Error::Batch(BatchError::AlreadyTerminal { id, status }) => Some(serde_json::json!({
                "batch_id": id,
                "status": status,
            })),
            Error::Batch(BatchError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "batch_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
