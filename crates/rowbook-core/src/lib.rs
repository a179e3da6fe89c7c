//! # rowbook-core
//!
//! Core data structures for the rowbook spreadsheet package codec.
//!
//! This crate provides the fundamental types used throughout rowbook:
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and ranges
//! - [`SharedStrings`] - The de-duplicated shared string pool
//! - [`CellType`] - Classification of raw values into cell types
//! - [`Registry`] - The sheet/table/part store with identifier allocation
//!
//! ## Example
//!
//! ```rust
//! use rowbook_core::{CellAddress, CellRange};
//!
//! let range = CellRange::parse("C3:D5").unwrap();
//! assert_eq!(range.start, CellAddress::new(2, 2));
//! assert_eq!(range.to_a1_string(), "C3:D5");
//! ```

pub mod address;
pub mod error;
pub mod part;
pub mod registry;
pub mod strings;
pub mod value;

// Re-exports for convenience
pub use address::{CellAddress, CellRange};
pub use error::{Error, Result};
pub use part::Part;
pub use registry::{Registry, Row, Sheet, SheetId, Table, TableColumn, TableId};
pub use strings::SharedStrings;
pub use value::{as_bool, classify, normalize_text, value_text, CellType};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Maximum number of characters in a single cell text (XML text-node limit)
pub const MAX_TEXT_LEN: usize = 32_767;
