//! End-to-end tests for the package codec (build -> write -> read -> verify)

use std::io::{Cursor, Read, Write};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use rowbook_core::{Part, Registry, Row};
use rowbook_xlsx::{parts, XlsxError, XlsxReader, XlsxWriter};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn fresh_registry() -> Registry {
    let mut registry = Registry::new();
    parts::seed(&mut registry);
    registry
}

fn build_package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(name.to_string(), options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn entry_text(buf: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(buf)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

#[test]
fn test_sheet_round_trip() {
    let mut registry = fresh_registry();
    let sheet = registry.add_sheet("TestSheet").unwrap();
    registry.sheet_mut(sheet).set_rows(vec![
        row(&[("name", json!("Alice")), ("age", json!(30))]),
        row(&[("name", json!("Bob")), ("age", json!(25))]),
    ]);

    let mut buf = Vec::new();
    XlsxWriter::write(&mut registry, Cursor::new(&mut buf)).unwrap();

    let reread = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet2 = reread.sheet_by_name("TestSheet").unwrap();
    let rows = reread.sheet(sheet2).rows();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name"), Some(&json!("Alice")));
    assert_eq!(rows[0].get("age"), Some(&json!(30)));
    assert_eq!(rows[1].get("name"), Some(&json!("Bob")));
    assert_eq!(rows[1].get("age"), Some(&json!(25)));
}

#[test]
fn test_multi_sheet_round_trip() {
    let mut registry = fresh_registry();
    let a = registry.add_sheet("First").unwrap();
    let b = registry.add_sheet("Second").unwrap();
    registry
        .sheet_mut(a)
        .set_rows(vec![row(&[("item", json!("Apple"))])]);
    registry
        .sheet_mut(b)
        .set_rows(vec![row(&[("price", json!(1.5))])]);

    let mut buf = Vec::new();
    XlsxWriter::write(&mut registry, Cursor::new(&mut buf)).unwrap();

    let reread = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let names: Vec<_> = reread
        .sheet_ids()
        .into_iter()
        .map(|id| reread.sheet(id).name().to_string())
        .collect();
    assert_eq!(names, ["First", "Second"]);

    let second = reread.sheet_by_name("Second").unwrap();
    assert_eq!(reread.sheet(second).rows()[0].get("price"), Some(&json!(1.5)));
}

#[test]
fn test_table_round_trip() {
    let mut registry = fresh_registry();
    let sheet = registry.add_sheet("Data").unwrap();
    registry
        .add_table(
            sheet,
            "People",
            vec![
                row(&[("name", json!("Alice")), ("age", json!(30))]),
                row(&[("name", json!("Bob")), ("age", json!(25))]),
            ],
        )
        .unwrap();

    let mut buf = Vec::new();
    XlsxWriter::write(&mut registry, Cursor::new(&mut buf)).unwrap();

    // The package carries the table part, the worksheet rels binding it, and
    // the tableParts list inside the worksheet.
    let table_xml = entry_text(&buf, "xl/tables/table1.xml");
    assert!(table_xml.contains(r#"name="People""#));
    assert!(table_xml.contains(r#"ref="A1:B3""#));
    assert!(table_xml.contains(r#"<tableColumn id="1" name="name"/>"#));
    assert!(table_xml.contains(r#"<tableColumn id="2" name="age"/>"#));

    let rels_xml = entry_text(&buf, "xl/worksheets/_rels/sheet1.xml.rels");
    assert!(rels_xml.contains(r#"Target="../tables/table1.xml""#));

    let ws_xml = entry_text(&buf, "xl/worksheets/sheet1.xml");
    assert!(ws_xml.contains(r#"<tableParts count="1"><tablePart r:id="rId1"/></tableParts>"#));

    let content_types = entry_text(&buf, "[Content_Types].xml");
    assert!(content_types.contains("/xl/tables/table1.xml"));

    let reread = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let tid = reread.table_by_name("People").unwrap();
    let table = reread.table(tid);
    assert_eq!(table.area().to_a1_string(), "A1:B3");
    let cols: Vec<_> = table.columns().iter().map(|c| c.name()).collect();
    assert_eq!(cols, ["name", "age"]);
    assert_eq!(table.rows().len(), 2);
    assert_eq!(table.rows()[0].get("name"), Some(&json!("Alice")));
    assert_eq!(table.rows()[1].get("age"), Some(&json!(25)));
}

#[test]
fn test_type_inference_serialization() {
    let mut registry = fresh_registry();
    let sheet = registry.add_sheet("Types").unwrap();
    registry.sheet_mut(sheet).set_rows(vec![row(&[
        ("flag", json!("True")),
        ("guid", json!("00123456-789a-4bcd-8123-1234567890ab")),
        ("total", json!("=SUM(1,2,3)")),
        ("missing", Value::Null),
    ])]);

    let mut buf = Vec::new();
    XlsxWriter::write(&mut registry, Cursor::new(&mut buf)).unwrap();

    let ws_xml = entry_text(&buf, "xl/worksheets/sheet1.xml");
    // "True" coerces to a boolean cell
    assert!(ws_xml.contains(r#"<c r="A2" t="b"><v>true</v></c>"#));
    // The GUID stays a shared string, never a number
    assert!(ws_xml.contains(r#"<c r="B2" t="s">"#));
    // The formula sheds its leading '='
    assert!(ws_xml.contains(r#"<c r="C2"><f>SUM(1,2,3)</f></c>"#));
    // Null renders as an empty shared string
    assert!(ws_xml.contains(r#"<c r="D2" t="s">"#));

    let shared = entry_text(&buf, "xl/sharedStrings.xml");
    assert!(shared.contains("<si><t>00123456-789a-4bcd-8123-1234567890ab</t></si>"));
    assert!(shared.contains("<si><t></t></si>"));

    // The boolean survives a read as a real boolean
    let reread = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet2 = reread.sheet_by_name("Types").unwrap();
    assert_eq!(reread.sheet(sheet2).rows()[0].get("flag"), Some(&json!(true)));
    assert_eq!(
        reread.sheet(sheet2).rows()[0].get("guid"),
        Some(&json!("00123456-789a-4bcd-8123-1234567890ab"))
    );
}

#[test]
fn test_opaque_parts_survive_round_trip() {
    let core_props = r#"<?xml version="1.0"?><coreProperties><creator>rowbook</creator></coreProperties>"#;

    let mut registry = fresh_registry();
    let sheet = registry.add_sheet("S").unwrap();
    registry
        .sheet_mut(sheet)
        .set_rows(vec![row(&[("a", json!(1))])]);
    registry.set_part("docProps/core.xml", Part::Raw(core_props.as_bytes().to_vec()));

    let mut buf = Vec::new();
    XlsxWriter::write(&mut registry, Cursor::new(&mut buf)).unwrap();

    // Conditional entries appear once the part exists
    let content_types = entry_text(&buf, "[Content_Types].xml");
    assert!(content_types.contains(r#"PartName="/docProps/core.xml""#));
    let root_rels = entry_text(&buf, "_rels/.rels");
    assert!(root_rels.contains(r#"Target="docProps/core.xml""#));

    // The bytes come through a full read -> write cycle untouched
    let mut reread = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let mut buf2 = Vec::new();
    XlsxWriter::write(&mut reread, Cursor::new(&mut buf2)).unwrap();
    assert_eq!(entry_text(&buf2, "docProps/core.xml"), core_props);
}

#[test]
fn test_read_recovers_partial_rows() {
    let buf = build_package(&[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        ),
        (
            "xl/workbook.xml",
            r#"<workbook><sheets><sheet name="S" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        (
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1" t="str"><v>name</v></c><c r="B1" t="str"><v>age</v></c></row>
                <row r="2"><c r="BOGUS" t="str"><v>Alice</v></c><c r="B2" t="n"><v>30</v></c></row>
            </sheetData></worksheet>"#,
        ),
    ]);

    let registry = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet = registry.sheet_by_name("S").unwrap();
    let rows = registry.sheet(sheet).rows();
    // The malformed cell is dropped; the rest of its row survives
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("age"), Some(&json!(30)));
    assert_eq!(rows[0].get("name"), None);
}

#[test]
fn test_read_resolves_shared_string_cells() {
    let buf = build_package(&[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        ),
        (
            "xl/sharedStrings.xml",
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>name</t></si><si><t>Alice</t></si></sst>"#,
        ),
        (
            "xl/workbook.xml",
            r#"<workbook><sheets><sheet name="S" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        (
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row><row r="2"><c r="A2" t="s"><v>1</v></c></row></sheetData></worksheet>"#,
        ),
    ]);

    let registry = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet = registry.sheet_by_name("S").unwrap();
    let rows = registry.sheet(sheet).rows();
    assert_eq!(rows[0].get("name"), Some(&json!("Alice")));
}

#[test]
fn test_missing_mandatory_parts_abort_the_read() {
    // No content types at all
    let empty = build_package(&[("dummy.txt", "x")]);
    assert!(matches!(
        XlsxReader::read(Cursor::new(&empty)),
        Err(XlsxError::MissingPart(_))
    ));

    // Content types but no workbook
    let no_workbook = build_package(&[(
        "[Content_Types].xml",
        r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
    )]);
    assert!(matches!(
        XlsxReader::read(Cursor::new(&no_workbook)),
        Err(XlsxError::MissingPart(_))
    ));
}

#[test]
fn test_second_write_is_idempotent() {
    let mut registry = fresh_registry();
    let sheet = registry.add_sheet("S").unwrap();
    registry
        .sheet_mut(sheet)
        .set_rows(vec![row(&[("a", json!("x")), ("b", json!(2))])]);

    let mut first = Vec::new();
    XlsxWriter::write(&mut registry, Cursor::new(&mut first)).unwrap();
    let mut second = Vec::new();
    XlsxWriter::write(&mut registry, Cursor::new(&mut second)).unwrap();

    for name in [
        "xl/workbook.xml",
        "xl/worksheets/sheet1.xml",
        "xl/sharedStrings.xml",
        "[Content_Types].xml",
    ] {
        assert_eq!(entry_text(&first, name), entry_text(&second, name), "{name}");
    }
}
