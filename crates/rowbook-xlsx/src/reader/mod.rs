//! Package reader
//!
//! Parts are ingested in dependency order, not file order: shared strings
//! first (cells reference pool indices), then the workbook (sheet list), then
//! workbook relationships (sheet targets), then table parts, then worksheets,
//! and finally everything else verbatim.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::Value;
use uuid::Uuid;

use rowbook_core::{value_text, CellAddress, CellRange, Part, Registry, Row, SharedStrings, SheetId};

use crate::error::{XlsxError, XlsxResult};
use crate::parts::{self, PLACEHOLDER};

/// Extracted cell grid: sheet row index → (column index → value)
type Grid = BTreeMap<u32, BTreeMap<u16, Value>>;

/// Package file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a package from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Registry> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a package from a reader
    pub fn read<R: Read + std::io::Seek>(reader: R) -> XlsxResult<Registry> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut registry = Registry::new();
        parts::seed(&mut registry);

        if entry_bytes(&mut archive, parts::CONTENT_TYPES)?.is_none() {
            return Err(XlsxError::MissingPart(parts::CONTENT_TYPES.into()));
        }

        // Shared strings before anything else: cell values are pool indices.
        if let Some(bytes) = entry_bytes(&mut archive, parts::SHARED_STRINGS)? {
            read_shared_strings(&mut registry, &bytes)?;
        }

        // Workbook before its relationships: relationship targets are looked
        // up by rel ids that only exist once the sheets are registered.
        let workbook = entry_bytes(&mut archive, parts::WORKBOOK)?
            .ok_or_else(|| XlsxError::MissingPart(parts::WORKBOOK.into()))?;
        read_workbook(&mut registry, &workbook)?;

        if let Some(bytes) = entry_bytes(&mut archive, parts::WORKBOOK_RELS)? {
            read_workbook_rels(&mut registry, &bytes)?;
        }

        for sheet_id in registry.sheet_ids() {
            read_sheet_tables(&mut registry, &mut archive, sheet_id)?;
        }
        for sheet_id in registry.sheet_ids() {
            read_worksheet(&mut registry, &mut archive, sheet_id)?;
        }

        // Everything else is stored verbatim as an opaque part.
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        for name in names {
            if name.ends_with('/') || registry.has_part(&name) {
                continue;
            }
            if let Some(bytes) = entry_bytes(&mut archive, &name)? {
                debug!("carrying part {} through verbatim", name);
                registry.set_part(name, Part::Raw(bytes));
            }
        }

        Ok(registry)
    }
}

fn entry_bytes<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> XlsxResult<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_shared_strings(registry: &mut Registry, bytes: &[u8]) -> XlsxResult<()> {
    let mut xml_reader = Reader::from_reader(bytes);

    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut index = 0u32;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"si" => {
                    registry.strings_mut().add(&current, Some(index));
                    index += 1;
                    current.clear();
                    in_si = false;
                }
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_t => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    debug!("shared strings: {} pooled entries", registry.strings().len());
    Ok(())
}

fn read_workbook(registry: &mut Registry, bytes: &[u8]) -> XlsxResult<()> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut sheet_num = None;
                let mut rel_id = None;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => {
                            name = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        b"sheetId" => {
                            sheet_num = attr
                                .unescape_value()
                                .ok()
                                .and_then(|s| s.parse::<u32>().ok());
                        }
                        b"r:id" => {
                            rel_id = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        _ => {}
                    }
                }

                if let Some(name) = name {
                    registry.insert_sheet(&name, sheet_num, rel_id, None)?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    debug!("workbook: {} sheets registered", registry.sheet_ids().len());

    // Keep the original shell; only the sheet list is regenerated on write.
    let text = String::from_utf8_lossy(bytes).into_owned();
    let shell = swap_section(&text, "<sheets", "</sheets>")
        .unwrap_or_else(|| parts::WORKBOOK_TEMPLATE.to_string());
    registry.set_part(parts::WORKBOOK, Part::Template(shell));
    Ok(())
}

struct Relationship {
    id: String,
    target: String,
    rel_type: String,
}

fn parse_relationships(bytes: &[u8]) -> XlsxResult<Vec<Relationship>> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                let mut rel_type = None;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = attr.unescape_value().ok().map(|s| s.to_string()),
                        b"Target" => target = attr.unescape_value().ok().map(|s| s.to_string()),
                        b"Type" => rel_type = attr.unescape_value().ok().map(|s| s.to_string()),
                        _ => {}
                    }
                }

                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    rels.push(Relationship {
                        id,
                        target,
                        rel_type,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

fn read_workbook_rels(registry: &mut Registry, bytes: &[u8]) -> XlsxResult<()> {
    for rel in parse_relationships(bytes)? {
        if rel.rel_type.ends_with("/worksheet") {
            let target = normalize_rel_target(&rel.target);
            registry.set_sheet_target(&rel.id, &target);
        }
    }
    Ok(())
}

// Relationship targets are relative to xl/; absolute targets get their
// leading /xl/ stripped.
fn normalize_rel_target(target: &str) -> String {
    target
        .strip_prefix("/xl/")
        .or_else(|| target.strip_prefix("xl/"))
        .unwrap_or(target)
        .to_string()
}

struct TableMeta {
    id: u32,
    name: String,
    uid: Option<Uuid>,
    area: CellRange,
    columns: Vec<String>,
}

fn read_sheet_tables<R: Read + std::io::Seek>(
    registry: &mut Registry,
    archive: &mut zip::ZipArchive<R>,
    sheet_id: SheetId,
) -> XlsxResult<()> {
    let target = registry.sheet(sheet_id).target().to_string();
    let rels_path = parts::sheet_rels_path(&target);
    let Some(bytes) = entry_bytes(archive, &rels_path)? else {
        return Ok(());
    };

    for rel in parse_relationships(&bytes)? {
        if !rel.rel_type.ends_with("/table") {
            continue;
        }
        let table_target = rel.target.trim_start_matches("../").to_string();
        let table_path = parts::part_path(&table_target);
        let Some(table_bytes) = entry_bytes(archive, &table_path)? else {
            warn!("table part {} missing; skipping", table_path);
            continue;
        };
        match parse_table_part(&table_bytes) {
            Ok(meta) => {
                registry.insert_parsed_table(
                    sheet_id,
                    rel.id,
                    meta.id,
                    &meta.name,
                    meta.uid,
                    meta.area,
                    meta.columns,
                    table_target,
                );
                registry.set_part(table_path, Part::Template(parts::TABLE_TEMPLATE.into()));
            }
            Err(e) => warn!("table part {}: {}; skipping", table_path, e),
        }
    }

    registry.set_part(rels_path, Part::Template(parts::SHEET_RELS_TEMPLATE.into()));
    Ok(())
}

fn parse_table_part(bytes: &[u8]) -> XlsxResult<TableMeta> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut id = None;
    let mut name = None;
    let mut uid = None;
    let mut area = None;
    let mut columns = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.name().as_ref() {
                b"table" => {
                    for attr in e.attributes().flatten() {
                        let value = match attr.unescape_value() {
                            Ok(v) => v.to_string(),
                            Err(_) => continue,
                        };
                        match attr.key.as_ref() {
                            b"id" => id = value.parse::<u32>().ok(),
                            b"name" => name = Some(value),
                            b"displayName" => {
                                if name.is_none() {
                                    name = Some(value);
                                }
                            }
                            b"ref" => area = CellRange::parse(&value).ok(),
                            b"xr:uid" => {
                                uid = Uuid::parse_str(value.trim_matches(|c| c == '{' || c == '}'))
                                    .ok();
                            }
                            _ => {}
                        }
                    }
                }
                b"tableColumn" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            if let Ok(v) = attr.unescape_value() {
                                columns.push(v.to_string());
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let name = name.ok_or_else(|| XlsxError::MalformedPart("table without a name".into()))?;
    let area = area.ok_or_else(|| XlsxError::MalformedPart("table without a ref".into()))?;
    Ok(TableMeta {
        id: id.unwrap_or(0),
        name,
        uid,
        area,
        columns,
    })
}

fn read_worksheet<R: Read + std::io::Seek>(
    registry: &mut Registry,
    archive: &mut zip::ZipArchive<R>,
    sheet_id: SheetId,
) -> XlsxResult<()> {
    let target = registry.sheet(sheet_id).target().to_string();
    let path = parts::part_path(&target);
    let Some(bytes) = entry_bytes(archive, &path)? else {
        warn!("worksheet part {} missing; sheet stays empty", path);
        registry.set_part(path, Part::Template(parts::WORKSHEET_TEMPLATE.into()));
        return Ok(());
    };

    let grid = extract_grid(&bytes, registry.strings())?;

    let rows = grid_to_rows(&grid);
    debug!("worksheet {}: {} data rows", target, rows.len());
    registry.sheet_mut(sheet_id).set_rows(rows);

    for tid in registry.sheet(sheet_id).tables().to_vec() {
        let area = registry.table(tid).area();
        let names: Vec<String> = registry
            .table(tid)
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let table_rows = grid_table_rows(&grid, area, &names);
        registry.table_mut(tid).set_rows(table_rows);
    }

    // Preserve the shell; the placeholder goes back inside <sheetData> so a
    // later write regenerates only the rows.
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let shell = swap_section(&text, "<sheetData", "</sheetData>")
        .unwrap_or_else(|| parts::WORKSHEET_TEMPLATE.to_string());
    registry.set_part(path, Part::Template(shell));
    Ok(())
}

/// Replace the content of the section delimited by `open`...`close` with the
/// placeholder, keeping everything around it. Handles self-closing sections.
fn swap_section(text: &str, open: &str, close: &str) -> Option<String> {
    let open_at = text.find(open)?;
    let open_end = open_at + text[open_at..].find('>')? + 1;

    let mut out = String::with_capacity(text.len());
    if text[open_at..open_end].ends_with("/>") {
        out.push_str(&text[..open_end - 2]);
        out.push('>');
        out.push_str(PLACEHOLDER);
        out.push_str(close);
        out.push_str(&text[open_end..]);
        return Some(out);
    }

    let close_at = text[open_end..].find(close)? + open_end;
    out.push_str(&text[..open_end]);
    out.push_str(PLACEHOLDER);
    out.push_str(&text[close_at..]);
    Some(out)
}

fn extract_grid(bytes: &[u8], strings: &SharedStrings) -> XlsxResult<Grid> {
    let mut xml_reader = Reader::from_reader(bytes);

    let mut buf = Vec::new();
    let mut grid: Grid = BTreeMap::new();

    let mut in_sheet_data = false;
    let mut in_cell = false;
    let mut in_value = false;
    let mut in_inline = false;
    let mut in_inline_t = false;
    let mut cell_ref: Option<String> = None;
    let mut cell_type: Option<String> = None;
    let mut raw: Option<String> = None;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"sheetData" => in_sheet_data = true,
                b"c" if in_sheet_data => {
                    in_cell = true;
                    cell_ref = None;
                    cell_type = None;
                    raw = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => {
                                cell_ref = attr.unescape_value().ok().map(|s| s.to_string());
                            }
                            b"t" => {
                                cell_type = attr.unescape_value().ok().map(|s| s.to_string());
                            }
                            _ => {}
                        }
                    }
                }
                b"v" if in_cell => in_value = true,
                b"is" if in_cell => in_inline = true,
                b"t" if in_inline => in_inline_t = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_value || in_inline_t => {
                if let Ok(text) = e.unescape() {
                    raw.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"sheetData" => in_sheet_data = false,
                b"v" => in_value = false,
                b"t" if in_inline_t => in_inline_t = false,
                b"is" => in_inline = false,
                b"c" if in_cell => {
                    in_cell = false;
                    record_cell(
                        &mut grid,
                        cell_ref.take(),
                        cell_type.take(),
                        raw.take(),
                        strings,
                    );
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(grid)
}

// Best-effort: a cell that cannot be decoded is dropped; the rest of its row
// still counts.
fn record_cell(
    grid: &mut Grid,
    cell_ref: Option<String>,
    cell_type: Option<String>,
    raw: Option<String>,
    strings: &SharedStrings,
) {
    let Some(cell_ref) = cell_ref else {
        warn!("cell without an address skipped");
        return;
    };
    let Some(raw) = raw else {
        return;
    };
    match CellAddress::parse(&cell_ref) {
        Ok(addr) => {
            let value = typed_value(cell_type.as_deref(), &raw, strings);
            grid.entry(addr.row).or_default().insert(addr.col, value);
        }
        Err(_) => warn!("malformed cell address '{}' skipped", cell_ref),
    }
}

fn typed_value(t: Option<&str>, raw: &str, strings: &SharedStrings) -> Value {
    match t {
        Some("s") => {
            if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = raw.parse::<u32>() {
                    if let Some(text) = strings.get(index) {
                        return Value::String(text.to_string());
                    }
                }
            }
            Value::String(raw.to_string())
        }
        Some("b") => Value::Bool(raw == "1" || raw.eq_ignore_ascii_case("true")),
        Some("n") | None => number_value(raw),
        _ => Value::String(raw.to_string()),
    }
}

fn number_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

// The first extracted row is the column-name list; later rows become row
// objects keyed by the name at each cell's column.
fn grid_to_rows(grid: &Grid) -> Vec<Row> {
    let mut row_iter = grid.values();
    let Some(header) = row_iter.next() else {
        return Vec::new();
    };
    let cols: BTreeMap<u16, String> = header
        .iter()
        .map(|(&col, value)| (col, value_text(value)))
        .collect();

    let mut rows = Vec::new();
    for cells in row_iter {
        let mut row = Row::new();
        for (&col, value) in cells {
            if let Some(name) = cols.get(&col) {
                row.insert(name.clone(), value.clone());
            }
        }
        rows.push(row);
    }
    rows
}

// Rows inside a table's rectangle, keyed by the column at each cell's offset
// from the table's top-left corner.
fn grid_table_rows(grid: &Grid, area: CellRange, columns: &[String]) -> Vec<Row> {
    let mut rows = Vec::new();
    for r in (area.start.row + 1)..=area.end.row {
        let Some(cells) = grid.get(&r) else {
            continue;
        };
        let mut row = Row::new();
        for (offset, name) in columns.iter().enumerate() {
            let col = area.start.col + offset as u16;
            if let Some(value) = cells.get(&col) {
                row.insert(name.clone(), value.clone());
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }
    rows
}
