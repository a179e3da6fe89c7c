//! # rowbook
//!
//! A Rust library for reading and writing spreadsheet packages (OOXML
//! zip-of-XML-parts) from tabular JSON row data, with no external
//! spreadsheet-format dependency.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rowbook::prelude::*;
//! use serde_json::json;
//!
//! let mut workbook = Workbook::new();
//! let rows = vec![
//!     [("name".to_string(), json!("Alice")), ("age".to_string(), json!(30))]
//!         .into_iter()
//!         .collect(),
//! ];
//! workbook.set_data("People", None, rows).unwrap();
//! workbook.write("people.xlsx").unwrap();
//!
//! let reread = Workbook::read("people.xlsx").unwrap();
//! assert_eq!(reread.sheet_names(), ["People"]);
//! ```

pub mod prelude;

// Re-export core types
pub use rowbook_core::{CellAddress, CellRange, Error, Registry, Row, SheetId, TableId};

// Re-export I/O types
pub use rowbook_xlsx::{XlsxError, XlsxReader, XlsxResult, XlsxWriter};

use std::fs::File;
use std::path::Path;

use rowbook_xlsx::parts;

/// A spreadsheet package: sheets and tables of row data behind a thin
/// facade over the package codec.
#[derive(Debug)]
pub struct Workbook {
    registry: Registry,
}

impl Workbook {
    /// Create an empty workbook
    pub fn new() -> Self {
        let mut registry = Registry::new();
        parts::seed(&mut registry);
        Self { registry }
    }

    /// Read a package from disk
    pub fn read<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        Ok(Self {
            registry: XlsxReader::read_file(path)?,
        })
    }

    /// Write the package to disk
    pub fn write<P: AsRef<Path>>(&mut self, path: P) -> XlsxResult<()> {
        XlsxWriter::write_file(&mut self.registry, path)
    }

    /// Names of all sheets, in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.registry
            .sheet_ids()
            .into_iter()
            .map(|id| self.registry.sheet(id).name().to_string())
            .collect()
    }

    /// Names of all tables, restricted to one sheet when `sheet` is given.
    /// An unknown sheet name yields an empty list.
    pub fn table_names(&self, sheet: Option<&str>) -> Vec<String> {
        let table_name = |id| self.registry.table(id).name().to_string();
        match sheet {
            Some(name) => self
                .registry
                .sheet_by_name(name)
                .map(|id| {
                    self.registry
                        .sheet(id)
                        .tables()
                        .iter()
                        .map(|&t| table_name(t))
                        .collect()
                })
                .unwrap_or_default(),
            None => self
                .registry
                .table_ids()
                .into_iter()
                .map(table_name)
                .collect(),
        }
    }

    /// Rows of a sheet, or of one of its tables.
    ///
    /// Returns `None` when the sheet (or table, or the sheet/table pairing)
    /// is unknown. Without a table name, sheet-level rows are returned,
    /// falling back to the sheet's first table.
    pub fn get_data(&self, sheet: &str, table: Option<&str>) -> Option<&[Row]> {
        let sheet_id = self.registry.sheet_by_name(sheet)?;
        match table {
            Some(table_name) => {
                let table_id = self.registry.table_by_name(table_name)?;
                if !self.registry.sheet(sheet_id).tables().contains(&table_id) {
                    return None;
                }
                Some(self.registry.table(table_id).rows())
            }
            None => {
                let record = self.registry.sheet(sheet_id);
                if record.rows().is_empty() {
                    if let Some(&table_id) = record.tables().first() {
                        return Some(self.registry.table(table_id).rows());
                    }
                }
                Some(record.rows())
            }
        }
    }

    /// Replace the rows of a sheet, or of a named table on it.
    ///
    /// Sheet and table are created on first reference; an existing name
    /// keeps its identity and only the rows change.
    pub fn set_data(&mut self, sheet: &str, table: Option<&str>, rows: Vec<Row>) -> XlsxResult<()> {
        let sheet_id = self.registry.add_sheet(sheet)?;
        match table {
            Some(table_name) => {
                self.registry.add_table(sheet_id, table_name, rows)?;
            }
            None => self.registry.sheet_mut(sheet_id).set_rows(rows),
        }
        Ok(())
    }

    /// The underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The underlying registry, mutably
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Load rows from a JSON data source.
///
/// `.json` files are read directly; `.json.gz`/`.gz` files are
/// gzip-decompressed first. Any other extension fails with
/// [`XlsxError::UnsupportedSource`].
pub fn load_rows<P: AsRef<Path>>(path: P) -> XlsxResult<Vec<Row>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("json") => {
            let file = File::open(path)?;
            Ok(serde_json::from_reader(file)?)
        }
        Some("gz") => {
            let file = File::open(path)?;
            let decoder = flate2::read::GzDecoder::new(file);
            Ok(serde_json::from_reader(decoder)?)
        }
        _ => Err(XlsxError::UnsupportedSource(path.display().to_string())),
    }
}
