/// Modelite Error Module
///
/// This module defines the error types shared by every layer of the crate.
/// It provides structured error handling with proper error propagation so
/// callers can distinguish their own configuration mistakes from store
/// failures.
use thiserror::Error;

/// Error type covering every failure mode of the mapping layer:
/// - Configuration mistakes (bad identifiers, empty arguments, registry conflicts)
/// - Value coercion between native attribute types and storage primitives
/// - Store failures reported by the underlying SQLite connection
/// - JSON encoding/decoding of compound attribute values
/// - Worker-thread and file-system failures
#[derive(Error, Debug)]
pub enum ModeliteError {
    /// Invalid caller configuration: bad table/column identifier, empty
    /// required argument, an exclusion set that leaves zero data columns,
    /// or conflicting registration of a database name. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value could not be coerced between its native type and a storage
    /// primitive. Aborts the enclosing operation.
    #[error("Coercion error: {0}")]
    Coercion(String),

    /// Failure reported by the SQLite connection (SQL error, I/O failure,
    /// constraint violation)
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// JSON encoding/decoding errors for compound attribute values
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial execution worker is unavailable (channel disconnected)
    #[error("Execution error: {0}")]
    Execution(String),
}

/// Type alias for Result to use ModeliteError as the error type.
///
/// This provides a consistent error type across the entire crate
/// instead of using `Result<T, String>` or mixed error types.
pub type Result<T> = std::result::Result<T, ModeliteError>;
