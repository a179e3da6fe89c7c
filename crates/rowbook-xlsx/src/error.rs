//! XLSX codec error types

use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur while reading or writing a package
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// A part's XML does not match the expected structure
    #[error("Malformed part: {0}")]
    MalformedPart(String),

    /// Template resolution invoked on already-final content, or without the
    /// registry state it needs
    #[error("Unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),

    /// Input file extension the reader does not recognize
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] rowbook_core::Error),
}
