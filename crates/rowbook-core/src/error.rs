//! Error types for rowbook-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rowbook-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address or range format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Invalid table name
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}
