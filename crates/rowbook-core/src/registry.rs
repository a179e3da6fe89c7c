//! Sheet/table registry
//!
//! One owned store for everything the codec tracks: the part map, the shared
//! string pool, and the sheet/table/column records with their identifiers.
//! Sheets and tables live in arenas addressed by integer handles; the
//! `rId…` relationship strings are serialized attributes, not keys.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::address::CellRange;
use crate::error::{Error, Result};
use crate::part::Part;
use crate::strings::SharedStrings;
use crate::MAX_SHEET_NAME_LEN;

/// One row of tabular data: column name → raw value, in first-seen order
pub type Row = Map<String, Value>;

/// Stable handle to a [`Sheet`] in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetId(usize);

/// Stable handle to a [`Table`] in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(usize);

/// A worksheet record
#[derive(Debug)]
pub struct Sheet {
    rel_id: String,
    name: String,
    sheet_id: u32,
    target: String,
    tables: Vec<TableId>,
    rows: Vec<Row>,
}

impl Sheet {
    /// Relationship id binding the workbook part to this sheet's part
    pub fn rel_id(&self) -> &str {
        &self.rel_id
    }

    /// Display name, unique across the workbook
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric sheet id, as serialized in the workbook part
    pub fn sheet_id(&self) -> u32 {
        self.sheet_id
    }

    /// Part path relative to `xl/` (e.g. `worksheets/sheet1.xml`)
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Tables hosted on this sheet, in creation order
    pub fn tables(&self) -> &[TableId] {
        &self.tables
    }

    /// Sheet-level row data
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Replace the sheet-level row data in place
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }
}

/// A column inside a [`Table`]
#[derive(Debug)]
pub struct TableColumn {
    ordinal: u32,
    name: String,
    uid: Uuid,
}

impl TableColumn {
    /// Table-local zero-based position, stable once assigned
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Column header text
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque column identifier
    pub fn uid(&self) -> Uuid {
        self.uid
    }
}

/// A table record
#[derive(Debug)]
pub struct Table {
    rel_id: String,
    table_id: u32,
    name: String,
    uid: Uuid,
    area: CellRange,
    columns: Vec<TableColumn>,
    row_count: u32,
    rows: Vec<Row>,
    target: String,
}

impl Table {
    /// Relationship id local to the owning worksheet's rels part
    pub fn rel_id(&self) -> &str {
        &self.rel_id
    }

    /// Package-wide numeric table id
    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    /// Display name, unique across the workbook
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque table identifier
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// The rectangle this table occupies (header row included)
    pub fn area(&self) -> CellRange {
        self.area
    }

    /// Columns in ordinal order
    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    /// Number of data rows (the header row is not counted)
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Row data
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Part path relative to `xl/` (e.g. `tables/table1.xml`)
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Replace the table's rows in place, keeping its identity.
    ///
    /// Columns already assigned keep their ordinals; keys unseen so far are
    /// appended. The area is resized around its existing origin.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.discover_columns(&rows);
        self.row_count = rows.len() as u32;
        self.rows = rows;
        self.resize_area();
    }

    /// Detach the row data, leaving the record empty
    pub fn take_rows(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    /// Reattach rows detached with [`Table::take_rows`], without re-running
    /// column discovery
    pub fn restore_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }

    /// Resolve a column name to its ordinal, registering it if unseen
    pub fn column_ordinal(&mut self, name: &str) -> u32 {
        if let Some(col) = self.columns.iter().find(|c| c.name == name) {
            return col.ordinal;
        }
        let ordinal = self.columns.len() as u32;
        self.columns.push(TableColumn {
            ordinal,
            name: name.to_string(),
            uid: Uuid::new_v4(),
        });
        self.resize_area();
        ordinal
    }

    fn discover_columns(&mut self, rows: &[Row]) {
        for row in rows {
            for key in row.keys() {
                if !self.columns.iter().any(|c| c.name == *key) {
                    let ordinal = self.columns.len() as u32;
                    self.columns.push(TableColumn {
                        ordinal,
                        name: key.clone(),
                        uid: Uuid::new_v4(),
                    });
                }
            }
        }
    }

    // Width tracks the column list, height tracks row_count + 1 for the
    // header; the origin never moves here (placement owns that).
    fn resize_area(&mut self) {
        let origin = self.area.start;
        let width = (self.columns.len() as u16).max(1);
        let height = self.row_count + 1;
        self.area = CellRange::from_indices(
            origin.row,
            origin.col,
            origin.row + height - 1,
            origin.col + width - 1,
        );
    }
}

/// The codec's one owned store: parts, shared strings, sheets and tables.
///
/// Readers, writers and the template engine all take this by reference;
/// every mutation site is an explicit parameter.
#[derive(Debug, Default)]
pub struct Registry {
    parts: BTreeMap<String, Part>,
    strings: SharedStrings,
    sheets: Vec<Sheet>,
    tables: Vec<Table>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    // ---- parts ----

    /// Look up a part by path
    pub fn part(&self, path: &str) -> Option<&Part> {
        self.parts.get(path)
    }

    /// Insert or replace a part
    pub fn set_part<P: Into<String>>(&mut self, path: P, part: Part) {
        self.parts.insert(path.into(), part);
    }

    /// Check whether a part exists at `path`
    pub fn has_part(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    /// All part paths, in lexical order
    pub fn part_paths(&self) -> Vec<String> {
        self.parts.keys().cloned().collect()
    }

    // ---- shared strings ----

    /// The shared string pool
    pub fn strings(&self) -> &SharedStrings {
        &self.strings
    }

    /// The shared string pool, mutably
    pub fn strings_mut(&mut self) -> &mut SharedStrings {
        &mut self.strings
    }

    // ---- sheets ----

    /// Sheet handles in registry order
    pub fn sheet_ids(&self) -> Vec<SheetId> {
        (0..self.sheets.len()).map(SheetId).collect()
    }

    /// Get a sheet record
    pub fn sheet(&self, id: SheetId) -> &Sheet {
        &self.sheets[id.0]
    }

    /// Get a sheet record, mutably
    pub fn sheet_mut(&mut self, id: SheetId) -> &mut Sheet {
        &mut self.sheets[id.0]
    }

    /// Find a sheet by display name
    pub fn sheet_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets.iter().position(|s| s.name == name).map(SheetId)
    }

    /// Find a sheet by relationship id
    pub fn sheet_by_rel_id(&self, rel_id: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|s| s.rel_id == rel_id)
            .map(SheetId)
    }

    /// Find a sheet by its part target (relative to `xl/`)
    pub fn sheet_by_target(&self, target: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|s| s.target == target)
            .map(SheetId)
    }

    /// Register a sheet by name, allocating fresh identifiers.
    ///
    /// A sheet that already exists under `name` is returned unchanged —
    /// identity is never duplicated; callers replace data separately.
    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId> {
        self.insert_sheet(name, None, None, None)
    }

    /// Register a sheet with explicit identifiers from a parsed package.
    ///
    /// Missing identifiers are allocated: the next free numeric id,
    /// `rId{id}`, and a `worksheets/sheet{id}.xml` target.
    pub fn insert_sheet(
        &mut self,
        name: &str,
        sheet_id: Option<u32>,
        rel_id: Option<String>,
        target: Option<String>,
    ) -> Result<SheetId> {
        validate_sheet_name(name)?;

        if let Some(id) = self.sheet_by_name(name) {
            return Ok(id);
        }

        let sheet_id = match sheet_id {
            Some(id) if id > 0 => id,
            _ => self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1,
        };
        let rel_id = match rel_id {
            Some(r) if !r.is_empty() => r,
            _ => format!("rId{}", sheet_id),
        };

        // A relationship id can only bind one sheet; a repeat registration
        // under the same id resolves to the existing record.
        if let Some(id) = self.sheet_by_rel_id(&rel_id) {
            return Ok(id);
        }

        let target = match target {
            Some(t) if !t.is_empty() => t,
            _ => format!("worksheets/sheet{}.xml", sheet_id),
        };

        self.sheets.push(Sheet {
            rel_id,
            name: name.to_string(),
            sheet_id,
            target,
            tables: Vec::new(),
            rows: Vec::new(),
        });
        Ok(SheetId(self.sheets.len() - 1))
    }

    /// Update a sheet's part target by relationship id (from a parsed
    /// relationships part); unknown ids are ignored
    pub fn set_sheet_target(&mut self, rel_id: &str, target: &str) {
        if let Some(id) = self.sheet_by_rel_id(rel_id) {
            self.sheets[id.0].target = target.to_string();
        }
    }

    // ---- tables ----

    /// Table handles in creation order
    pub fn table_ids(&self) -> Vec<TableId> {
        (0..self.tables.len()).map(TableId).collect()
    }

    /// Get a table record
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    /// Get a table record, mutably
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    /// Find a table by display name
    pub fn table_by_name(&self, name: &str) -> Option<TableId> {
        self.tables.iter().position(|t| t.name == name).map(TableId)
    }

    /// Register a table on `sheet` and fill it with `rows`.
    ///
    /// A table that already exists under `name` keeps its identity (ids,
    /// uid, target, host sheet); only its rows are replaced. New tables are
    /// placed after any existing tables on the sheet, leaving a two-column
    /// gap.
    pub fn add_table(&mut self, sheet: SheetId, name: &str, rows: Vec<Row>) -> Result<TableId> {
        if name.is_empty() {
            return Err(Error::InvalidTableName("empty name".into()));
        }

        if let Some(id) = self.table_by_name(name) {
            self.tables[id.0].set_rows(rows);
            let host = self.host_sheet(id);
            if let Some(host) = host {
                self.place_tables(host);
            }
            return Ok(id);
        }

        let table_id = self.tables.iter().map(|t| t.table_id).max().unwrap_or(0) + 1;
        let rel_id = format!("rId{}", self.sheets[sheet.0].tables.len() + 1);
        let mut table = Table {
            rel_id,
            table_id,
            name: name.to_string(),
            uid: Uuid::new_v4(),
            area: CellRange::from_indices(0, 0, 0, 0),
            columns: Vec::new(),
            row_count: 0,
            rows: Vec::new(),
            target: format!("tables/table{}.xml", table_id),
        };
        table.set_rows(rows);

        self.tables.push(table);
        let id = TableId(self.tables.len() - 1);
        self.sheets[sheet.0].tables.push(id);
        self.place_tables(sheet);
        Ok(id)
    }

    /// Register a table parsed from an existing package, keeping the ids,
    /// uid, area and column order the package declared
    #[allow(clippy::too_many_arguments)]
    pub fn insert_parsed_table(
        &mut self,
        sheet: SheetId,
        rel_id: String,
        table_id: u32,
        name: &str,
        uid: Option<Uuid>,
        area: CellRange,
        column_names: Vec<String>,
        target: String,
    ) -> TableId {
        if let Some(id) = self.table_by_name(name) {
            return id;
        }

        let columns = column_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| TableColumn {
                ordinal: i as u32,
                name,
                uid: Uuid::new_v4(),
            })
            .collect::<Vec<_>>();

        let row_count = area.row_count().saturating_sub(1);
        self.tables.push(Table {
            rel_id,
            table_id,
            name: name.to_string(),
            uid: uid.unwrap_or_else(Uuid::new_v4),
            area,
            columns,
            row_count,
            rows: Vec::new(),
            target,
        });
        let id = TableId(self.tables.len() - 1);
        self.sheets[sheet.0].tables.push(id);
        id
    }

    /// The sheet hosting a table
    pub fn host_sheet(&self, table: TableId) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|s| s.tables.contains(&table))
            .map(SheetId)
    }

    /// Recompute table rectangles on a sheet.
    ///
    /// The first table keeps its origin; every later table starts no earlier
    /// than two columns past the previous table's rightmost column. Row 1 is
    /// always the header row of each rectangle.
    pub fn place_tables(&mut self, sheet: SheetId) {
        let ids = self.sheets[sheet.0].tables.clone();
        let mut next_start: u16 = 0;
        for (i, tid) in ids.iter().enumerate() {
            let table = &mut self.tables[tid.0];
            let origin_row = table.area.start.row;
            let start_col = if i == 0 {
                table.area.start.col
            } else {
                table.area.start.col.max(next_start)
            };
            let width = (table.columns.len() as u16).max(1);
            let height = table.row_count + 1;
            table.area = CellRange::from_indices(
                origin_row,
                start_col,
                origin_row + height - 1,
                start_col + width - 1,
            );
            // Two-column gap: rightmost + 2
            next_start = start_col + width + 1;
        }
    }

    // ---- split borrows for the serializer ----

    /// Borrow a table and the string pool at once
    pub fn table_and_strings(&mut self, id: TableId) -> (&mut Table, &mut SharedStrings) {
        (&mut self.tables[id.0], &mut self.strings)
    }

    /// Borrow a sheet and the string pool at once
    pub fn sheet_and_strings(&mut self, id: SheetId) -> (&mut Sheet, &mut SharedStrings) {
        (&mut self.sheets[id.0], &mut self.strings)
    }
}

fn validate_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidSheetName("empty name".into()));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(Error::InvalidSheetName(format!(
            "'{}' is longer than {} characters",
            name, MAX_SHEET_NAME_LEN
        )));
    }
    if name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
        return Err(Error::InvalidSheetName(format!(
            "'{}' contains a forbidden character",
            name
        )));
    }
    Ok(())
}
