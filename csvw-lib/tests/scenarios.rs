//! End-to-end scenarios over in-memory metadata and CSV bytes.

use std::sync::Once;

use csvw::{CsvwError, Metadata, ParseOptions, Row, RowEvent, Value};
use serde_json::json;
use tracing::info;

static INIT: Once = Once::new();

/// Initialize logging exactly once for all tests
fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

fn parse(metadata: serde_json::Value) -> Metadata {
    Metadata::parse(&metadata, ParseOptions::default())
        .unwrap()
        .normalize()
}

fn run(metadata: &Metadata, csv: &[u8]) -> (Vec<Row>, Vec<String>) {
    let table = metadata.first_table().unwrap();
    let mut rows = Vec::new();
    let mut comments = Vec::new();
    metadata
        .each_row(table, csv, |event| match event {
            RowEvent::Row(row) => rows.push(row),
            RowEvent::Comment(comment) => comments.push(comment),
        })
        .unwrap();
    (rows, comments)
}

#[test]
fn minimal_group_yields_string_rows() {
    init_logging();
    info!("S1: minimal group");

    let metadata = parse(json!({
        "@context": "http://www.w3.org/ns/csvw",
        "tables": [{"url": "t.csv"}]
    }));
    let (rows, _) = run(&metadata, b"name,age\nAlice,30\nBob,25\n");

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].number, rows[0].source_number), (1, 2));
    assert_eq!(rows[0].cells[0].string_value, "Alice");
    assert_eq!(
        rows[0].cells[1].value,
        Some(Value::String {
            value: "30".into(),
            lang: None
        })
    );
    assert_eq!((rows[1].number, rows[1].source_number), (2, 3));
    assert_eq!(rows[1].cells[0].string_value, "Bob");
}

#[test]
fn minimal_group_with_integer_column() {
    let metadata = parse(json!({
        "@context": "http://www.w3.org/ns/csvw",
        "tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "name"},
            {"name": "age", "datatype": "integer"}
        ]}}]
    }));
    let (rows, _) = run(&metadata, b"name,age\nAlice,30\nBob,25\n");
    assert_eq!(rows[0].cells[1].value, Some(Value::Integer(30)));
    assert_eq!(rows[1].cells[1].value, Some(Value::Integer(25)));
}

#[test]
fn comment_rows_become_annotations() {
    init_logging();
    info!("S2: comment rows");

    let metadata = parse(json!({
        "tables": [{"url": "t.csv",
            "dialect": {"commentPrefix": "#", "skipRows": 0},
            "tableSchema": {"columns": [{"name": "name"}]}}]
    }));
    let (rows, comments) = run(&metadata, b"#hello\nname\nAlice\n");

    assert_eq!(comments, vec!["hello"]);
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].number, rows[0].source_number), (1, 3));
    assert_eq!(
        rows[0].cells[0].value,
        Some(Value::String {
            value: "Alice".into(),
            lang: None
        })
    );
}

#[test]
fn number_format_with_group_and_decimal_chars() {
    init_logging();
    info!("S3: number format");

    let metadata = parse(json!({
        "tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "amount", "datatype": {
                "base": "decimal",
                "format": {"decimalChar": ",", "groupChar": "."}
            }}
        ]}}]
    }));

    let (rows, _) = run(&metadata, b"amount\n\"1.234,50\"\n");
    match &rows[0].cells[0].value {
        Some(Value::Decimal(decimal)) => {
            assert_eq!(decimal.to_string(), "1234.50");
        }
        other => panic!("expected decimal, got {:?}", other),
    }

    let (rows, _) = run(&metadata, b"amount\n\"1..234,50\"\n");
    let cell = &rows[0].cells[0];
    assert!(cell.errors[0].contains("repeating ."));
    // The cell still carries the raw value as a fallback literal.
    assert_eq!(
        cell.value,
        Some(Value::String {
            value: "1..234,50".into(),
            lang: None
        })
    );
}

#[test]
fn date_format_canonicalizes() {
    init_logging();
    info!("S4: date format");

    let metadata = parse(json!({
        "tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "signed", "datatype": {"base": "date", "format": "dd/MM/yyyy"}}
        ]}}]
    }));
    let (rows, _) = run(&metadata, b"signed\n04/07/1776\n");
    let cell = &rows[0].cells[0];
    assert!(cell.errors.is_empty());
    match &cell.value {
        Some(Value::Date { lexical, .. }) => assert_eq!(lexical, "1776-07-04"),
        other => panic!("expected date, got {:?}", other),
    }
}

#[test]
fn uri_templates_expand_from_names_and_siblings() {
    init_logging();
    info!("S5: URI templates");

    let metadata = parse(json!({
        "tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "id"},
            {"name": "age",
             "propertyUrl": "http://ex/{_name}",
             "aboutUrl": "http://ex/p/{id}"}
        ]}}]
    }));
    let (rows, _) = run(&metadata, b"id,age\n7,30\n");
    let age = &rows[0].cells[1];
    assert_eq!(age.property_url.as_deref(), Some("http://ex/age"));
    assert_eq!(age.about_url.as_deref(), Some("http://ex/p/7"));
}

#[test]
fn foreign_key_to_unknown_table_fails_validation() {
    init_logging();
    info!("S6: foreign-key validation");

    let metadata = Metadata::parse(
        &json!({
            "tables": [{"url": "t.csv", "tableSchema": {
                "columns": [{"name": "other_id"}],
                "foreignKeys": [{
                    "columnReference": "other_id",
                    "reference": {"resource": "other.csv", "columnReference": "id"}
                }]
            }}]
        }),
        ParseOptions {
            base: Some(url::Url::parse("http://example.org/meta.json").unwrap()),
            ..Default::default()
        },
    )
    .unwrap()
    .normalize();

    let errors = metadata.validate();
    assert!(errors.iter().any(|e| e.contains(
        "invalid property 'foreignKeys': table referenced by http://example.org/other.csv not found"
    )));

    let strict = metadata.validate_strict().unwrap_err();
    assert!(matches!(strict, CsvwError::MetadataValidation(_)));
}

#[test]
fn normalize_is_idempotent() {
    let metadata = Metadata::parse(
        &json!({
            "tables": [{"url": "t.csv", "notes": ["first"], "dc:title": "Title"}]
        }),
        ParseOptions {
            base: Some(url::Url::parse("http://example.org/meta.json").unwrap()),
            default_language: Some("en".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let once = metadata.normalize();
    let snapshot = once.to_json();
    assert_eq!(snapshot, once.normalize().to_json());
}

#[test]
fn merge_identity_and_associativity() {
    let a = parse(json!({"tables": [{"url": "a.csv"}]}));
    let b = parse(json!({"tables": [{"url": "b.csv"}]}));
    let c = parse(json!({"tables": [{"url": "c.csv"}]}));
    let empty = parse(json!({"tables": []}));

    assert_eq!(a.merge(&empty).unwrap().to_json(), a.to_json());

    let urls = |m: &Metadata| -> Vec<String> {
        m.tables().iter().filter_map(|t| m.table_url(*t)).collect()
    };
    let left = a.merge(&b).unwrap().merge(&c).unwrap();
    let right = a.merge(&b.merge(&c).unwrap()).unwrap();
    assert_eq!(urls(&left), urls(&right));
}

#[test]
fn duplicate_names_survive_merge_as_errors() {
    let a = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
        {"name": "a", "titles": "A"}, {"name": "b", "titles": "B"}
    ]}}]}));
    let b = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
        {"name": "a", "titles": "A"}, {"name": "a", "titles": "B"}
    ]}}]}));
    let merged = a.merge(&b).unwrap();
    // B's second column renames to "a" only if A had no name; A wins here,
    // so the merged document stays valid.
    assert!(merged.validate().is_empty());

    let duplicated = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
        {"name": "dup"}, {"name": "dup"}
    ]}}]}));
    assert!(duplicated
        .validate()
        .iter()
        .any(|e| e.contains("duplicate column name")));
}

#[test]
fn null_round_trip_with_value_url() {
    let metadata = parse(json!({
        "tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "ref", "null": "NA", "valueUrl": "http://ex/{ref}"}
        ]}}]
    }));
    let (rows, _) = run(&metadata, b"ref\nNA\nok\n");
    assert!(rows[0].cells[0].value.is_none());
    assert!(rows[0].cells[0].value_url.is_none());
    assert_eq!(
        rows[1].cells[0].value_url.as_deref(),
        Some("http://ex/ok")
    );
}

#[test]
fn separator_preserves_empty_items() {
    let metadata = parse(json!({
        "tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "tags", "separator": "|", "null": "NA"}
        ]}}]
    }));
    let (rows, _) = run(&metadata, b"tags\na||c\n");
    match &rows[0].cells[0].value {
        Some(Value::List(items)) => {
            let strings: Vec<Option<String>> = items
                .iter()
                .map(|item| item.as_ref().map(Value::lexical))
                .collect();
            assert_eq!(
                strings,
                vec![
                    Some("a".to_string()),
                    Some("".to_string()),
                    Some("c".to_string())
                ]
            );
        }
        other => panic!("expected list, got {:?}", other),
    }
}

#[test]
fn annotated_model_round_trip() {
    let metadata = parse(json!({
        "tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "name"},
            {"name": "age", "datatype": "integer"}
        ]}}]
    }));
    let atd = metadata.to_atd();
    assert_eq!(atd["@context"], json!("http://www.w3.org/ns/csvw"));
    assert_eq!(atd["@type"], json!("TableGroup"));
    assert_eq!(atd["tables"][0]["url"], json!("t.csv"));

    let (rows, _) = run(&metadata, b"name,age\nAlice,30\n");
    let row_atd = rows[0].to_atd(&metadata);
    assert_eq!(row_atd["cells"][1]["value"], json!(30));
}
