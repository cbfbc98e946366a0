//! Error types for etholog-core

use thiserror::Error;

/// Main error type for the etholog-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required table is missing from one of the attached schemas
    #[error("schema error: missing table {schema}.{table}")]
    Schema { schema: String, table: String },

    /// Column lookup on a materialized table failed
    #[error("column error: {0}")]
    Column(String),
}

/// Result type alias for etholog-core
pub type Result<T> = std::result::Result<T, Error>;
