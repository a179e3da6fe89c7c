//! End-to-end tests for the facade (set data -> write -> read -> verify)

use std::fs::File;
use std::io::Write as _;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use rowbook::prelude::*;

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn people_rows() -> Vec<Row> {
    vec![
        row(&[("name", json!("Alice")), ("age", json!(30))]),
        row(&[("name", json!("Bob")), ("age", json!(25))]),
    ]
}

#[test]
fn test_end_to_end_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.xlsx");

    let mut workbook = Workbook::new();
    workbook.set_data("TestSheet", None, people_rows()).unwrap();
    workbook.write(&path).unwrap();

    let reread = Workbook::read(&path).unwrap();
    assert_eq!(reread.sheet_names(), ["TestSheet"]);

    let rows = reread.get_data("TestSheet", None).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name"), Some(&json!("Alice")));
    assert_eq!(rows[0].get("age"), Some(&json!(30)));
    assert_eq!(rows[1].get("name"), Some(&json!("Bob")));
    assert_eq!(rows[1].get("age"), Some(&json!(25)));
}

#[test]
fn test_table_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tables.xlsx");

    let mut workbook = Workbook::new();
    workbook
        .set_data("Data", Some("People"), people_rows())
        .unwrap();
    workbook.write(&path).unwrap();

    let reread = Workbook::read(&path).unwrap();
    assert_eq!(reread.table_names(None), ["People"]);
    assert_eq!(reread.table_names(Some("Data")), ["People"]);
    assert_eq!(reread.table_names(Some("Missing")), Vec::<String>::new());

    let rows = reread.get_data("Data", Some("People")).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("name"), Some(&json!("Bob")));

    // Without a table name the same rows are still reachable
    let fallback = reread.get_data("Data", None).unwrap();
    assert_eq!(fallback.len(), 2);
}

#[test]
fn test_get_data_unknown_names() {
    let mut workbook = Workbook::new();
    workbook.set_data("S", Some("T"), people_rows()).unwrap();

    assert!(workbook.get_data("Nope", None).is_none());
    assert!(workbook.get_data("S", Some("Nope")).is_none());

    // A table looked up through the wrong sheet is not found
    workbook.set_data("Other", None, Vec::new()).unwrap();
    assert!(workbook.get_data("Other", Some("T")).is_none());
}

#[test]
fn test_set_data_replaces_rows_in_place() {
    let mut workbook = Workbook::new();
    workbook.set_data("S", None, people_rows()).unwrap();
    workbook
        .set_data("S", None, vec![row(&[("name", json!("Carol"))])])
        .unwrap();

    assert_eq!(workbook.sheet_names(), ["S"]);
    let rows = workbook.get_data("S", None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("Carol")));
}

#[test]
fn test_bool_and_number_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("types.xlsx");

    let mut workbook = Workbook::new();
    workbook
        .set_data(
            "Types",
            None,
            vec![row(&[
                ("flag", json!("True")),
                ("count", json!("42")),
                ("label", json!("plain")),
            ])],
        )
        .unwrap();
    workbook.write(&path).unwrap();

    let reread = Workbook::read(&path).unwrap();
    let rows = reread.get_data("Types", None).unwrap();
    // "True" serialized as a boolean cell and comes back as one
    assert_eq!(rows[0].get("flag"), Some(&json!(true)));
    // "42" serialized as a number cell and comes back numeric
    assert_eq!(rows[0].get("count"), Some(&json!(42)));
    assert_eq!(rows[0].get("label"), Some(&json!("plain")));
}

#[test]
fn test_load_rows_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.json");
    std::fs::write(&path, r#"[{"name":"Alice","age":30},{"name":"Bob","age":25}]"#).unwrap();

    let rows = load_rows(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name"), Some(&json!("Alice")));
    assert_eq!(rows[1].get("age"), Some(&json!(25)));
}

#[test]
fn test_load_rows_gzip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.json.gz");

    let file = File::create(&path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder
        .write_all(br#"[{"name":"Alice"}]"#)
        .unwrap();
    encoder.finish().unwrap();

    let rows = load_rows(&path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("Alice")));
}

#[test]
fn test_load_rows_rejects_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.csv");
    std::fs::write(&path, "name\nAlice\n").unwrap();

    assert!(matches!(
        load_rows(&path),
        Err(XlsxError::UnsupportedSource(_))
    ));
}

#[test]
fn test_two_tables_on_one_sheet_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_tables.xlsx");

    let mut workbook = Workbook::new();
    workbook
        .set_data("Data", Some("People"), people_rows())
        .unwrap();
    workbook
        .set_data(
            "Data",
            Some("Cities"),
            vec![row(&[("city", json!("Oslo")), ("pop", json!(700000))])],
        )
        .unwrap();
    workbook.write(&path).unwrap();

    let reread = Workbook::read(&path).unwrap();
    assert_eq!(reread.table_names(Some("Data")), ["People", "Cities"]);

    // First table at A1:B3, second no earlier than column D
    let people = reread.registry().table_by_name("People").unwrap();
    let cities = reread.registry().table_by_name("Cities").unwrap();
    assert_eq!(reread.registry().table(people).area().to_a1_string(), "A1:B3");
    assert!(reread.registry().table(cities).area().start.col >= 3);

    let rows = reread.get_data("Data", Some("Cities")).unwrap();
    assert_eq!(rows[0].get("city"), Some(&json!("Oslo")));
    assert_eq!(rows[0].get("pop"), Some(&json!(700000)));
}
