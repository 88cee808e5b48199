//! Common error types for MRR

use thiserror::Error;

/// Common result type for MRR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by ingestion, settings and export
#[derive(Error, Debug)]
pub enum Error {
    /// No encoding/parser combination could decode an upload
    #[error("Unreadable file: {0}")]
    UnreadableFile(String),

    /// File extension outside {csv, xls, xlsx}
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A numeric field could not be parsed
    #[error("Malformed value for {field}: {value:?}")]
    MalformedFieldValue { field: String, value: String },

    /// A percentage outside [0, 100]
    #[error("Value out of range for {field}: {value} (expected 0..=100)")]
    OutOfRangeValue { field: String, value: f64 },

    /// Export or listing found nothing to produce
    #[error("No data: {0}")]
    EmptyResultSet(String),

    /// A concrete period is required for this operation
    #[error("Missing required filter: {0}")]
    MissingRequiredFilter(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Export serialization failure
    #[error("Export error: {0}")]
    Export(String),

    /// Internal error (poisoned lock and similar)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Notices are reported to the caller but are not failures.
    pub fn is_notice(&self) -> bool {
        matches!(self, Error::EmptyResultSet(_))
    }

    pub fn malformed(field: &str, value: impl Into<String>) -> Self {
        Error::MalformedFieldValue {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn out_of_range(field: &str, value: f64) -> Self {
        Error::OutOfRangeValue {
            field: field.to_string(),
            value,
        }
    }
}
