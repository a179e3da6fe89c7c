//! Convenient imports for common rowbook usage
//!
//! ```rust
//! use rowbook::prelude::*;
//!
//! let workbook = Workbook::new();
//! assert!(workbook.sheet_names().is_empty());
//! ```

pub use crate::{load_rows, Workbook};

pub use rowbook_core::{CellAddress, CellRange, Row};
pub use rowbook_xlsx::{XlsxError, XlsxResult};
