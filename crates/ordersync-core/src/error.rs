//! Error types for ordersync-core

use thiserror::Error;

/// Result type alias using ordersync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ordersync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing markers, malformed column mapping).
    /// Fatal: aborts the run, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Merge reconciliation failure; the transaction is rolled back.
    #[error("Merge validation failed: expected {expected} classified rows, got {actual}")]
    MergeValidation { expected: usize, actual: usize },

    /// A pending selection was requested with no discriminating filter
    #[error("Refusing unfiltered selection: supply at least one of customer, order number, or season")]
    EmptyFilter,

    /// Database error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
