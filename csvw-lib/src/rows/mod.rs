//! Row iteration: drive a CSV reader with the resolved dialect, skip header
//! rows, route comments, and emit one logical Row per data line.

use std::collections::HashMap;
use std::io::Read;

use tracing::warn;
use url::Url;

use crate::cell::{process_cell, Cell, Value};
use crate::dialect::DialectOptions;
use crate::error::{CsvwError, Diagnostics};
use crate::metadata::{Metadata, NodeId};
use crate::uri_template::UriTemplate;

/// One logical data row. Rows are short-lived: they do not outlive the sink
/// callback that consumes them.
#[derive(Debug, Clone)]
pub struct Row {
    /// 1-based over emitted data rows.
    pub number: u64,
    /// 1-based physical position in the file.
    pub source_number: u64,
    pub table: NodeId,
    pub cells: Vec<Cell>,
    /// Indices into `cells` of the schema's primary-key columns.
    pub primary_key: Vec<usize>,
}

#[derive(Debug, Clone)]
pub enum RowEvent {
    Row(Row),
    /// A comment-prefixed or header-region comment line, already stripped.
    Comment(String),
}

impl Metadata {
    /// Iterate the data rows of `table` from `input`, yielding rows and
    /// comment annotations to `sink`. Row-width problems are fatal; cell
    /// level problems land on each cell's error list.
    pub fn each_row<R, F>(&self, table: NodeId, input: R, mut sink: F) -> Result<(), CsvwError>
    where
        R: Read,
        F: FnMut(RowEvent),
    {
        let mut dialect_diagnostics = Diagnostics::new();
        let dialect = DialectOptions::for_table(self, table, &mut dialect_diagnostics);
        for diagnostic in dialect_diagnostics.get_warnings() {
            warn!("{}", diagnostic.message());
        }

        let columns = self.table_columns(table);
        let non_virtual = columns
            .iter()
            .filter(|c| !self.is_virtual(**c))
            .count();
        let primary_key = self.primary_key_indices(table);
        let mut seen_keys: std::collections::HashSet<Vec<String>> = std::collections::HashSet::new();
        let row_base = self
            .table_url(table)
            .map(|u| self.context().resolve_link(&u))
            .and_then(|u| Url::parse(&u).ok());

        let mut reader = dialect.reader_for(input);
        let mut skip_remaining = dialect.skip_rows;
        let mut header_remaining = dialect.header_row_count;
        let mut source_number: u64 = 0;
        let mut number: u64 = 0;

        for record in reader.records() {
            let record = record?;
            // The reader drops blank lines, so the physical position comes
            // from the record itself rather than a running count.
            source_number = record
                .position()
                .map(|p| p.line())
                .unwrap_or(source_number + 1);

            if skip_remaining > 0 {
                skip_remaining -= 1;
                if let Some(comment) = dialect.comment_of(&record) {
                    sink(RowEvent::Comment(comment));
                }
                continue;
            }
            if let Some(comment) = dialect.comment_of(&record) {
                sink(RowEvent::Comment(comment));
                continue;
            }
            if header_remaining > 0 {
                header_remaining -= 1;
                continue;
            }
            if dialect.skip_blank_rows
                && record.iter().all(|field| field.trim().is_empty())
            {
                continue;
            }

            number += 1;
            let mut row = self.build_row(table, &columns, non_virtual, &dialect, &record, number, source_number, row_base.as_ref())?;
            row.primary_key = primary_key.clone();

            // A repeated primary-key value marks the key cells in error.
            if !row.primary_key.is_empty() {
                let key: Vec<String> = row
                    .primary_key
                    .iter()
                    .filter_map(|i| row.cells.get(*i))
                    .map(|cell| cell.value.as_ref().map(Value::lexical).unwrap_or_default())
                    .collect();
                if !seen_keys.insert(key.clone()) {
                    let message = format!("duplicate primary key ({})", key.join(","));
                    for index in row.primary_key.clone() {
                        if let Some(cell) = row.cells.get_mut(index) {
                            cell.errors.push(message.clone());
                        }
                    }
                }
            }

            sink(RowEvent::Row(row));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_row(
        &self,
        table: NodeId,
        columns: &[NodeId],
        non_virtual: usize,
        dialect: &DialectOptions,
        record: &csv::StringRecord,
        number: u64,
        source_number: u64,
        row_base: Option<&Url>,
    ) -> Result<Row, CsvwError> {
        let skip_columns = dialect.skip_columns as usize;
        let fields: Vec<&str> = record.iter().skip(skip_columns).collect();

        if fields.len() < non_virtual {
            return Err(CsvwError::RowWidth {
                source_number,
                got: fields.len(),
                want: non_virtual,
            });
        }

        // Without declared columns every field is a plain string cell.
        if columns.is_empty() {
            let cells = fields
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    let trimmed = dialect.trim.apply(field).to_string();
                    Cell {
                        column: None,
                        number: index + 1,
                        source_number: index + 1 + skip_columns,
                        string_value: field.to_string(),
                        value: Some(Value::String {
                            value: trimmed,
                            lang: None,
                        }),
                        about_url: None,
                        property_url: None,
                        value_url: None,
                        errors: Vec::new(),
                    }
                })
                .collect();
            return Ok(Row {
                number,
                source_number,
                table,
                cells,
                primary_key: Vec::new(),
            });
        }

        let mut cells = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let raw = fields.get(index).copied().unwrap_or("");
            let processed = process_cell(self, *column, raw, dialect);
            cells.push(Cell {
                column: Some(*column),
                number: index + 1,
                source_number: index + 1 + skip_columns,
                string_value: raw.to_string(),
                value: processed.value,
                about_url: None,
                property_url: None,
                value_url: None,
                errors: processed.errors,
            });
        }

        self.expand_cell_urls(&mut cells, columns, number, source_number, row_base);

        Ok(Row {
            number,
            source_number,
            table,
            cells,
            primary_key: Vec::new(),
        })
    }

    /// Expand `aboutUrl`, `propertyUrl` and `valueUrl` for every cell of a
    /// row, against the shared column-name variable map.
    fn expand_cell_urls(
        &self,
        cells: &mut [Cell],
        columns: &[NodeId],
        number: u64,
        source_number: u64,
        row_base: Option<&Url>,
    ) {
        let mut variables: HashMap<String, String> = HashMap::new();
        for (index, column) in columns.iter().enumerate() {
            let name = self.column_name(*column, index + 1);
            let value = cells[index]
                .value
                .as_ref()
                .map(Value::lexical)
                .unwrap_or_default();
            // Templates address columns by the percent-decoded name.
            let decoded = percent_encoding::percent_decode_str(&name)
                .decode_utf8_lossy()
                .to_string();
            if decoded != name {
                variables.insert(decoded, value.clone());
            }
            variables.insert(name, value);
        }
        variables.insert("_row".to_string(), number.to_string());
        variables.insert("_sourceRow".to_string(), source_number.to_string());

        for (index, cell) in cells.iter_mut().enumerate() {
            let column = match cell.column {
                Some(column) => column,
                None => continue,
            };
            let mut variables = variables.clone();
            variables.insert(
                "_name".to_string(),
                self.column_name(column, index + 1),
            );
            variables.insert("_column".to_string(), cell.number.to_string());
            variables.insert(
                "_sourceColumn".to_string(),
                cell.source_number.to_string(),
            );

            let expand = |key: &str| -> Option<String> {
                let template = self.resolve(column, key)?;
                let template = template.as_str()?.to_string();
                let template = match UriTemplate::parse(&template) {
                    Ok(template) => template,
                    Err(_) => return None,
                };
                let expanded = template.expand(&variables);
                Some(match row_base {
                    Some(base) => base
                        .join(&expanded)
                        .map(|u| u.to_string())
                        .unwrap_or(expanded),
                    None => expanded,
                })
            };

            cell.about_url = expand("aboutUrl");
            cell.property_url = expand("propertyUrl");
            // A null cell in a non-virtual column emits no valueUrl.
            let is_virtual = self.is_virtual(column);
            if cell.value.is_some() || is_virtual {
                cell.value_url = expand("valueUrl");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParseOptions;
    use serde_json::{json, Value as JsonValue};

    fn collect(metadata: &Metadata, csv: &[u8]) -> Vec<RowEvent> {
        let table = metadata.first_table().unwrap();
        let mut events = Vec::new();
        metadata
            .each_row(table, csv, |event| events.push(event))
            .unwrap();
        events
    }

    fn rows(events: Vec<RowEvent>) -> Vec<Row> {
        events
            .into_iter()
            .filter_map(|event| match event {
                RowEvent::Row(row) => Some(row),
                RowEvent::Comment(_) => None,
            })
            .collect()
    }

    fn parse(json: JsonValue) -> Metadata {
        Metadata::parse(&json, ParseOptions::default()).unwrap()
    }

    #[test]
    fn row_numbering_skips_header() {
        let metadata = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "name"}, {"name": "age"}
        ]}}]}));
        let rows = rows(collect(&metadata, b"name,age\nAlice,30\nBob,25\n"));
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].number, rows[0].source_number), (1, 2));
        assert_eq!((rows[1].number, rows[1].source_number), (2, 3));
        assert_eq!(rows[0].cells[0].string_value, "Alice");
    }

    #[test]
    fn comments_are_routed_and_do_not_count() {
        let metadata = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "name"}
        ]}}]}));
        let events = collect(&metadata, b"#hello\nname\nAlice\n");
        let comments: Vec<&String> = events
            .iter()
            .filter_map(|event| match event {
                RowEvent::Comment(comment) => Some(comment),
                _ => None,
            })
            .collect();
        assert_eq!(comments, vec!["hello"]);
        let rows = rows(events);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].number, rows[0].source_number), (1, 3));
    }

    #[test]
    fn blank_rows_skip_when_configured() {
        let metadata = parse(json!({"tables": [{"url": "t.csv",
            "dialect": {"skipBlankRows": true},
            "tableSchema": {"columns": [{"name": "name"}]}}]}));
        let rows = rows(collect(&metadata, b"name\nAlice\n\nBob\n"));
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[1].number, rows[1].source_number), (2, 4));
    }

    #[test]
    fn narrow_row_is_fatal() {
        let metadata = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "a"}, {"name": "b"}
        ]}}]}));
        let table = metadata.first_table().unwrap();
        let result = metadata.each_row(table, &b"a,b\nonly-one\n"[..], |_| {});
        assert!(matches!(
            result,
            Err(CsvwError::RowWidth {
                source_number: 2,
                got: 1,
                want: 2
            })
        ));
    }

    #[test]
    fn virtual_columns_fill_missing_fields() {
        let metadata = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "name"},
            {"name": "kind", "virtual": true, "default": "person"}
        ]}}]}));
        let rows = rows(collect(&metadata, b"name\nAlice\n"));
        assert_eq!(
            rows[0].cells[1].value,
            Some(Value::String {
                value: "person".into(),
                lang: None
            })
        );
    }

    #[test]
    fn uri_templates_expand_per_cell() {
        let metadata = Metadata::parse(
            &json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
                {"name": "id"},
                {"name": "age",
                 "propertyUrl": "http://ex/{_name}",
                 "aboutUrl": "http://ex/p/{id}"}
            ]}}]}),
            ParseOptions {
                base: Some(Url::parse("http://example.org/meta.json").unwrap()),
                ..Default::default()
            },
        )
        .unwrap()
        .normalize();
        let rows = rows(collect(&metadata, b"id,age\n7,30\n"));
        let age = &rows[0].cells[1];
        assert_eq!(age.property_url.as_deref(), Some("http://ex/age"));
        assert_eq!(age.about_url.as_deref(), Some("http://ex/p/7"));
    }

    #[test]
    fn null_cell_omits_value_url() {
        let metadata = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "ref", "null": "NA", "valueUrl": "http://ex/{ref}"}
        ]}}]}));
        let rows = rows(collect(&metadata, b"ref\nNA\n"));
        assert!(rows[0].cells[0].value.is_none());
        assert!(rows[0].cells[0].value_url.is_none());
    }

    #[test]
    fn duplicate_primary_keys_mark_cells_in_error() {
        let metadata = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {
            "columns": [{"name": "id"}, {"name": "name"}],
            "primaryKey": "id"
        }}]}));
        let rows = rows(collect(&metadata, b"id,name\n1,Alice\n2,Bob\n1,Carol\n"));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].primary_key, vec![0]);
        assert!(rows[0].cells[0].errors.is_empty());
        assert!(rows[1].cells[0].errors.is_empty());
        assert_eq!(
            rows[2].cells[0].errors,
            vec!["duplicate primary key (1)".to_string()]
        );
        // Only the key cells are marked.
        assert!(rows[2].cells[1].errors.is_empty());
    }

    #[test]
    fn composite_primary_keys_compare_all_columns() {
        let metadata = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {
            "columns": [{"name": "a"}, {"name": "b"}],
            "primaryKey": ["a", "b"]
        }}]}));
        let rows = rows(collect(&metadata, b"a,b\n1,x\n1,y\n1,x\n"));
        assert!(rows[1].cells[0].errors.is_empty());
        assert!(!rows[2].cells[0].errors.is_empty());
        assert!(!rows[2].cells[1].errors.is_empty());
    }

    #[test]
    fn cells_without_schema_are_plain_strings() {
        let metadata = parse(json!({"tables": [{"url": "t.csv"}]}));
        let rows = rows(collect(&metadata, b"name,age\nAlice,30\n"));
        assert_eq!(rows[0].cells.len(), 2);
        assert_eq!(
            rows[0].cells[1].value,
            Some(Value::String {
                value: "30".into(),
                lang: None
            })
        );
    }

    #[test]
    fn skip_columns_offsets_source_numbers() {
        let metadata = parse(json!({"tables": [{"url": "t.csv",
            "dialect": {"skipColumns": 1},
            "tableSchema": {"columns": [{"name": "name"}]}}]}));
        let rows = rows(collect(&metadata, b"x,name\n0,Alice\n"));
        let cell = &rows[0].cells[0];
        assert_eq!(cell.string_value, "Alice");
        assert_eq!(cell.number, 1);
        assert_eq!(cell.source_number, 2);
    }
}
