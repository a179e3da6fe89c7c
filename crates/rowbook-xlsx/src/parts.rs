//! Part template catalog and resolution
//!
//! Every generated part starts life as an XML skeleton containing exactly one
//! `{placeholder}` token. Resolution is keyed by part path and fills the
//! placeholder from the current registry state; the same registry state
//! always produces the same text.

use rowbook_core::{normalize_text, Part, Registry, SheetId};

use crate::error::{XlsxError, XlsxResult};
use crate::sheetml;

/// The substitution token every template carries exactly once
pub const PLACEHOLDER: &str = "{placeholder}";

/// Workbook part path
pub const WORKBOOK: &str = "xl/workbook.xml";
/// Workbook relationships part path
pub const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
/// Package relationships part path
pub const ROOT_RELS: &str = "_rels/.rels";
/// Content types part path
pub const CONTENT_TYPES: &str = "[Content_Types].xml";
/// Shared strings part path
pub const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
/// Styles part path (opaque passthrough only)
pub const STYLES: &str = "xl/styles.xml";
/// Theme part path (opaque passthrough only)
pub const THEME: &str = "xl/theme/theme1.xml";
/// Core document properties part path (opaque passthrough only)
pub const CORE_PROPS: &str = "docProps/core.xml";
/// Extended document properties part path (opaque passthrough only)
pub const APP_PROPS: &str = "docProps/app.xml";

const WORKSHEET_PREFIX: &str = "xl/worksheets/";
const WORKSHEET_RELS_PREFIX: &str = "xl/worksheets/_rels/";
const TABLE_PREFIX: &str = "xl/tables/";

pub(crate) const WORKBOOK_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><workbookPr/><sheets>{placeholder}</sheets><definedNames/><calcPr/></workbook>"#;

pub(crate) const WORKBOOK_RELS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{placeholder}</Relationships>"#;

pub(crate) const ROOT_RELS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>{placeholder}</Relationships>"#;

pub(crate) const CONTENT_TYPES_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default ContentType="application/xml" Extension="xml"/><Default ContentType="application/vnd.openxmlformats-package.relationships+xml" Extension="rels"/>{placeholder}</Types>"#;

pub(crate) const SHARED_STRINGS_TEMPLATE: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>{placeholder}"#;

// Fresh worksheets carry the placeholder directly under the root element so
// resolution can emit both the sheet data and the table-parts list. A
// worksheet re-templated from a parsed package keeps its original shell with
// the placeholder inside <sheetData> instead.
pub(crate) const WORKSHEET_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{placeholder}</worksheet>"#;

pub(crate) const TABLE_TEMPLATE: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>{placeholder}"#;

pub(crate) const SHEET_RELS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{placeholder}</Relationships>"#;

/// Seed a registry with the mandatory part templates
pub fn seed(registry: &mut Registry) {
    registry.set_part(WORKBOOK, Part::Template(WORKBOOK_TEMPLATE.into()));
    registry.set_part(WORKBOOK_RELS, Part::Template(WORKBOOK_RELS_TEMPLATE.into()));
    registry.set_part(ROOT_RELS, Part::Template(ROOT_RELS_TEMPLATE.into()));
    registry.set_part(CONTENT_TYPES, Part::Template(CONTENT_TYPES_TEMPLATE.into()));
    registry.set_part(
        SHARED_STRINGS,
        Part::Template(SHARED_STRINGS_TEMPLATE.into()),
    );
}

/// Full package path of a worksheet or table target (relative to `xl/`)
pub fn part_path(target: &str) -> String {
    format!("xl/{}", target)
}

/// Relationships part path for a worksheet target, e.g.
/// `worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`
pub fn sheet_rels_path(target: &str) -> String {
    match target.rsplit_once('/') {
        Some((dir, file)) => format!("xl/{}/_rels/{}.rels", dir, file),
        None => format!("xl/_rels/{}.rels", target),
    }
}

/// Escape text for inclusion in XML content or attribute values
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Resolve the part at `path` into final XML text.
///
/// Fails with [`XlsxError::UnresolvedPlaceholder`] when the part is already
/// final, its template lost the placeholder, or the registry has no state
/// backing it.
pub fn resolve(registry: &mut Registry, path: &str) -> XlsxResult<String> {
    let template = match registry.part(path) {
        Some(Part::Template(t)) => t.clone(),
        Some(_) => return Err(XlsxError::UnresolvedPlaceholder(path.to_string())),
        None => return Err(XlsxError::MissingPart(path.to_string())),
    };
    if !template.contains(PLACEHOLDER) {
        return Err(XlsxError::UnresolvedPlaceholder(path.to_string()));
    }

    let fragment = match path {
        WORKBOOK => workbook_fragment(registry),
        WORKBOOK_RELS => workbook_rels_fragment(registry),
        ROOT_RELS => root_rels_fragment(registry),
        CONTENT_TYPES => content_types_fragment(registry),
        SHARED_STRINGS => shared_strings_fragment(registry),
        p if p.starts_with(WORKSHEET_RELS_PREFIX) => sheet_rels_fragment(registry, p)?,
        p if p.starts_with(WORKSHEET_PREFIX) => worksheet_fragment(registry, p, &template)?,
        p if p.starts_with(TABLE_PREFIX) => table_fragment(registry, p)?,
        other => return Err(XlsxError::UnresolvedPlaceholder(other.to_string())),
    };

    Ok(template.replace(PLACEHOLDER, &fragment))
}

fn workbook_fragment(registry: &Registry) -> String {
    let mut xml = String::new();
    for id in registry.sheet_ids() {
        let sheet = registry.sheet(id);
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="{}"/>"#,
            escape_xml(sheet.name()),
            sheet.sheet_id(),
            sheet.rel_id()
        ));
    }
    xml
}

fn workbook_rels_fragment(registry: &Registry) -> String {
    let mut xml = String::new();
    let mut last_id = 0u32;
    for id in registry.sheet_ids() {
        let sheet = registry.sheet(id);
        last_id = last_id.max(sheet.sheet_id());
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Target="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet"/>"#,
            sheet.rel_id(),
            escape_xml(sheet.target())
        ));
    }
    if registry.has_part(SHARED_STRINGS) {
        last_id += 1;
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Target="sharedStrings.xml" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings"/>"#,
            last_id
        ));
    }
    if registry.has_part(THEME) {
        last_id += 1;
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Target="theme/theme1.xml" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme"/>"#,
            last_id
        ));
    }
    if registry.has_part(STYLES) {
        last_id += 1;
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Target="styles.xml" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles"/>"#,
            last_id
        ));
    }
    xml
}

fn root_rels_fragment(registry: &Registry) -> String {
    let mut xml = String::new();
    if registry.has_part(CORE_PROPS) {
        xml.push_str(
            r#"<Relationship Id="rId2" Target="docProps/core.xml" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties"/>"#,
        );
    }
    if registry.has_part(APP_PROPS) {
        xml.push_str(
            r#"<Relationship Id="rId3" Target="docProps/app.xml" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties"/>"#,
        );
    }
    xml
}

fn content_types_fragment(registry: &Registry) -> String {
    let mut xml = String::from(
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    for id in registry.sheet_ids() {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            escape_xml(registry.sheet(id).target())
        ));
    }
    for id in registry.table_ids() {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml"/>"#,
            escape_xml(registry.table(id).target())
        ));
    }
    if registry.has_part(SHARED_STRINGS) {
        xml.push_str(
            r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
        );
    }
    if registry.has_part(THEME) {
        xml.push_str(
            r#"<Override PartName="/xl/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#,
        );
    }
    if registry.has_part(STYLES) {
        xml.push_str(
            r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );
    }
    if registry.has_part(CORE_PROPS) {
        xml.push_str(
            r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
        );
    }
    if registry.has_part(APP_PROPS) {
        xml.push_str(
            r#"<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#,
        );
    }
    xml
}

fn shared_strings_fragment(registry: &Registry) -> String {
    let mut entries = String::new();
    for (_, text) in registry.strings().iter() {
        entries.push_str(&format!("<si><t>{}</t></si>", escape_xml(text)));
    }
    format!(
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}</sst>"#,
        entries
    )
}

// A fresh worksheet template gets the whole body (sheet data plus table
// parts); a shell preserved from a parsed package keeps everything outside
// <sheetData> and only the rows are filled in.
fn worksheet_fragment(
    registry: &mut Registry,
    path: &str,
    template: &str,
) -> XlsxResult<String> {
    let target = path.strip_prefix("xl/").unwrap_or(path);
    let sheet_id = registry
        .sheet_by_target(target)
        .ok_or_else(|| XlsxError::UnresolvedPlaceholder(path.to_string()))?;

    let rows_xml = sheetml::sheet_data_xml(registry, sheet_id);
    if template.contains("<sheetData>") {
        Ok(rows_xml)
    } else {
        Ok(format!(
            "<sheetData>{}</sheetData>{}",
            rows_xml,
            table_parts_xml(registry, sheet_id)
        ))
    }
}

fn table_parts_xml(registry: &Registry, sheet_id: SheetId) -> String {
    let tables = registry.sheet(sheet_id).tables();
    if tables.is_empty() {
        return String::new();
    }
    let mut xml = format!(r#"<tableParts count="{}">"#, tables.len());
    for &tid in tables {
        xml.push_str(&format!(
            r#"<tablePart r:id="{}"/>"#,
            registry.table(tid).rel_id()
        ));
    }
    xml.push_str("</tableParts>");
    xml
}

fn sheet_rels_fragment(registry: &Registry, path: &str) -> XlsxResult<String> {
    let sheet_id = registry
        .sheet_ids()
        .into_iter()
        .find(|&id| sheet_rels_path(registry.sheet(id).target()) == path)
        .ok_or_else(|| XlsxError::UnresolvedPlaceholder(path.to_string()))?;

    let mut xml = String::new();
    for &tid in registry.sheet(sheet_id).tables() {
        let table = registry.table(tid);
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/table" Target="../{}"/>"#,
            table.rel_id(),
            escape_xml(table.target())
        ));
    }
    Ok(xml)
}

fn table_fragment(registry: &Registry, path: &str) -> XlsxResult<String> {
    let table_id = registry
        .table_ids()
        .into_iter()
        .find(|&id| part_path(registry.table(id).target()) == path)
        .ok_or_else(|| XlsxError::UnresolvedPlaceholder(path.to_string()))?;
    let table = registry.table(table_id);

    let mut columns = String::new();
    for col in table.columns() {
        columns.push_str(&format!(
            r#"<tableColumn id="{}" name="{}"/>"#,
            col.ordinal() + 1,
            escape_xml(&normalize_text(col.name()))
        ));
    }

    let area = table.area().to_a1_string();
    Ok(format!(
        r#"<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:xr="http://schemas.microsoft.com/office/spreadsheetml/2014/revision" xr:uid="{{{}}}" id="{}" name="{}" displayName="{}" ref="{}" headerRowCount="1"><autoFilter ref="{}"/><tableColumns count="{}">{}</tableColumns></table>"#,
        table.uid(),
        table.table_id(),
        escape_xml(table.name()),
        escape_xml(table.name()),
        area,
        area,
        table.columns().len(),
        columns
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_seed_installs_mandatory_templates() {
        let mut reg = Registry::new();
        seed(&mut reg);
        for path in [
            WORKBOOK,
            WORKBOOK_RELS,
            ROOT_RELS,
            CONTENT_TYPES,
            SHARED_STRINGS,
        ] {
            assert!(matches!(reg.part(path), Some(Part::Template(_))), "{path}");
        }
    }

    #[test]
    fn test_workbook_resolution_lists_sheets_in_order() {
        let mut reg = Registry::new();
        seed(&mut reg);
        reg.add_sheet("First").unwrap();
        reg.add_sheet("Second").unwrap();

        let xml = resolve(&mut reg, WORKBOOK).unwrap();
        assert!(xml.contains(r#"<sheet name="First" sheetId="1" r:id="rId1"/>"#));
        assert!(xml.contains(r#"<sheet name="Second" sheetId="2" r:id="rId2"/>"#));
        assert!(xml.find("First").unwrap() < xml.find("Second").unwrap());
        assert!(!xml.contains(PLACEHOLDER));
    }

    #[test]
    fn test_workbook_rels_continue_after_sheet_ids() {
        let mut reg = Registry::new();
        seed(&mut reg);
        reg.add_sheet("Only").unwrap();

        let xml = resolve(&mut reg, WORKBOOK_RELS).unwrap();
        assert!(xml.contains(r#"Id="rId1" Target="worksheets/sheet1.xml""#));
        // Shared strings template is seeded, so its relationship follows
        assert!(xml.contains(r#"Id="rId2" Target="sharedStrings.xml""#));
    }

    #[test]
    fn test_resolving_final_content_is_an_error() {
        let mut reg = Registry::new();
        seed(&mut reg);
        reg.set_part(WORKBOOK, Part::Text("<workbook/>".into()));
        assert!(matches!(
            resolve(&mut reg, WORKBOOK),
            Err(XlsxError::UnresolvedPlaceholder(_))
        ));
    }

    #[test]
    fn test_resolving_worksheet_without_sheet_is_an_error() {
        let mut reg = Registry::new();
        seed(&mut reg);
        reg.set_part(
            "xl/worksheets/sheet9.xml",
            Part::Template(WORKSHEET_TEMPLATE.into()),
        );
        assert!(matches!(
            resolve(&mut reg, "xl/worksheets/sheet9.xml"),
            Err(XlsxError::UnresolvedPlaceholder(_))
        ));
    }

    #[test]
    fn test_shared_strings_resolution_escapes_text() {
        let mut reg = Registry::new();
        seed(&mut reg);
        reg.strings_mut().find("a<b");
        let xml = resolve(&mut reg, SHARED_STRINGS).unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>a&lt;b</t></si></sst>"#
        );
    }

    #[test]
    fn test_sheet_rels_path() {
        assert_eq!(
            sheet_rels_path("worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
    }
}
