//! Row/cell XML serialization
//!
//! Turns row objects into `<row>`/`<c>` markup. Row 1 of every rectangle is
//! the header; data rows follow in order. Cell encoding is decided by the
//! value's classified type.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use rowbook_core::{
    as_bool, classify, normalize_text, value_text, CellAddress, CellType, Registry, Row, SheetId,
    SharedStrings, Table,
};

use crate::parts::escape_xml;

// `[@Column]` tokens inside formulas
static STRUCTURED_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[@([^\[\]]+)\]").unwrap());

/// Serialize a sheet's row data.
///
/// A sheet without tables renders its sheet-level rows at A1; a sheet with
/// tables renders each table's rectangle at its placed origin.
pub(crate) fn sheet_data_xml(registry: &mut Registry, sheet_id: SheetId) -> String {
    let table_ids = registry.sheet(sheet_id).tables().to_vec();
    if table_ids.is_empty() {
        let (sheet, strings) = registry.sheet_and_strings(sheet_id);
        plain_rows_xml(sheet.rows(), strings)
    } else {
        let mut xml = String::new();
        for tid in table_ids {
            let (table, strings) = registry.table_and_strings(tid);
            xml.push_str(&table_rows_xml(table, strings));
        }
        xml
    }
}

// Sheet-level data: columns are discovered while walking the rows, so the
// header row is rendered last and prepended.
fn plain_rows_xml(rows: &[Row], strings: &mut SharedStrings) -> String {
    let mut cols: Vec<String> = Vec::new();
    let mut body = String::new();

    for (i, row) in rows.iter().enumerate() {
        let sheet_row = i as u32 + 1; // row 0 is the header
        let mut cells = String::new();
        for (key, value) in row {
            let col = ordinal_of(&mut cols, key);
            let addr = CellAddress::new(sheet_row, col);
            cells.push_str(&cell_xml(strings, addr, value, &mut |name| {
                ordinal_of(&mut cols, name)
            }));
        }
        body.push_str(&format!(r#"<row r="{}">{}</row>"#, sheet_row + 1, cells));
    }

    let mut header = String::new();
    for (i, name) in cols.iter().enumerate() {
        let addr = CellAddress::new(0, i as u16);
        let index = strings.find(&normalize_text(name));
        header.push_str(&format!(
            r#"<c r="{}" t="s"><v>{}</v></c>"#,
            addr.to_a1_string(),
            index
        ));
    }
    format!(r#"<row r="1">{}</row>{}"#, header, body)
}

fn ordinal_of(cols: &mut Vec<String>, name: &str) -> u16 {
    match cols.iter().position(|c| c == name) {
        Some(i) => i as u16,
        None => {
            cols.push(name.to_string());
            (cols.len() - 1) as u16
        }
    }
}

// One table's rectangle. The header is rendered after the data rows so that
// columns registered through formula references still appear in it.
fn table_rows_xml(table: &mut Table, strings: &mut SharedStrings) -> String {
    let origin = table.area().start;

    let rows = table.take_rows();
    let mut body = String::new();
    for (i, row) in rows.iter().enumerate() {
        let sheet_row = origin.row + 1 + i as u32;
        let mut cells = String::new();
        for (key, value) in row {
            let ordinal = table.column_ordinal(key) as u16;
            let addr = CellAddress::new(sheet_row, origin.col + ordinal);
            cells.push_str(&cell_xml(strings, addr, value, &mut |name| {
                origin.col + table.column_ordinal(name) as u16
            }));
        }
        body.push_str(&format!(r#"<row r="{}">{}</row>"#, sheet_row + 1, cells));
    }
    table.restore_rows(rows);

    let mut header = String::new();
    for col in table.columns() {
        let addr = CellAddress::new(origin.row, origin.col + col.ordinal() as u16);
        let index = strings.find(&normalize_text(col.name()));
        header.push_str(&format!(
            r#"<c r="{}" t="s"><v>{}</v></c>"#,
            addr.to_a1_string(),
            index
        ));
    }
    format!(
        r#"<row r="{}">{}</row>{}"#,
        origin.row + 1,
        header,
        body
    )
}

fn cell_xml(
    strings: &mut SharedStrings,
    addr: CellAddress,
    value: &Value,
    resolve_col: &mut dyn FnMut(&str) -> u16,
) -> String {
    let r = addr.to_a1_string();
    match classify(value) {
        CellType::Boolean | CellType::BoolText => {
            format!(r#"<c r="{}" t="b"><v>{}</v></c>"#, r, as_bool(value))
        }
        CellType::Number => {
            let text = value_text(value);
            format!(r#"<c r="{}" t="n"><v>{}</v></c>"#, r, text.trim())
        }
        CellType::Formula => {
            let text = value_text(value);
            let body = rewrite_structured_refs(&text[1..], addr.row, resolve_col);
            format!(r#"<c r="{}"><f>{}</f></c>"#, r, escape_xml(&body))
        }
        CellType::Null => {
            let index = strings.find("");
            format!(r#"<c r="{}" t="s"><v>{}</v></c>"#, r, index)
        }
        CellType::Text => {
            let index = strings.find(&normalize_text(&value_text(value)));
            format!(r#"<c r="{}" t="s"><v>{}</v></c>"#, r, index)
        }
    }
}

// `[@Col]` becomes the absolute reference of that column at the current row.
fn rewrite_structured_refs(
    formula: &str,
    row: u32,
    resolve_col: &mut dyn FnMut(&str) -> u16,
) -> String {
    STRUCTURED_REF_RE
        .replace_all(formula, |caps: &regex::Captures<'_>| {
            let col = resolve_col(&caps[1]);
            CellAddress::new(row, col).to_absolute_string()
        })
        .into_owned()
}
