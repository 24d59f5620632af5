//! Annotated-model builders: plain map forms of metadata nodes, rows and
//! cells for downstream RDF/JSON emitters. Ordering is stable (`@id`,
//! `@type`, own properties, nested collections) and nulls and empty arrays
//! are dropped.

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::cell::Cell;
use crate::context::CSVW_NS;
use crate::metadata::{Metadata, NodeId, Slot};
use crate::rows::Row;

impl Metadata {
    /// The annotated-table-descriptor form of the whole document.
    pub fn to_atd(&self) -> JsonValue {
        let map = match self.node_to_atd(self.root()) {
            JsonValue::Object(map) => map,
            other => return other,
        };
        let mut with_context = JsonMap::new();
        with_context.insert("@context".to_string(), json!(CSVW_NS));
        with_context.extend(map);
        JsonValue::Object(with_context)
    }

    pub fn node_to_atd(&self, id: NodeId) -> JsonValue {
        let node = self.node(id);
        let mut map = JsonMap::new();

        if let Some(at_id) = node.value("@id") {
            map.insert("@id".to_string(), at_id.clone());
        }
        map.insert("@type".to_string(), json!(node.kind.type_name()));

        // Own scalar properties first, then annotations, then collections.
        for (key, slot) in node.slots() {
            if matches!(key, "@id" | "@type") {
                continue;
            }
            if let Slot::Value(value) = slot {
                if keep(value) {
                    map.insert(key.to_string(), value.clone());
                }
            }
        }
        for (key, value) in &node.annotations {
            if keep(value) {
                map.insert(key.clone(), value.clone());
            }
        }
        for (key, slot) in node.slots() {
            match slot {
                Slot::Node(child) => {
                    map.insert(key.to_string(), self.node_to_atd(*child));
                }
                Slot::Nodes(children) => {
                    if !children.is_empty() {
                        map.insert(
                            key.to_string(),
                            JsonValue::Array(
                                children.iter().map(|c| self.node_to_atd(*c)).collect(),
                            ),
                        );
                    }
                }
                Slot::Value(_) => {}
            }
        }

        let mut atd = JsonValue::Object(map);
        if node.kind == crate::metadata::NodeKind::Table {
            self.add_column_fragments(id, &mut atd);
        }
        atd
    }

    /// Attach `#col=<sourceNumber>` identifiers (RFC 7111) to the columns of
    /// a table's annotated form.
    fn add_column_fragments(&self, table: NodeId, atd: &mut JsonValue) {
        let url = match self.table_url(table) {
            Some(url) => self.context().resolve_link(&url),
            None => return,
        };
        let mut diagnostics = crate::error::Diagnostics::new();
        let skip_columns =
            crate::dialect::DialectOptions::for_table(self, table, &mut diagnostics).skip_columns
                as usize;

        let columns = match atd
            .get_mut("tableSchema")
            .and_then(|schema| schema.get_mut("columns"))
            .and_then(JsonValue::as_array_mut)
        {
            Some(columns) => columns,
            None => return,
        };
        for (index, column) in columns.iter_mut().enumerate() {
            if let Some(map) = column.as_object_mut() {
                if !map.contains_key("@id") {
                    let fragment =
                        json!(format!("{}#col={}", url, index + 1 + skip_columns));
                    let mut with_id = JsonMap::new();
                    with_id.insert("@id".to_string(), fragment);
                    with_id.extend(std::mem::take(map));
                    *map = with_id;
                }
            }
        }
    }
}

impl Row {
    /// The annotated record of one row, with RFC 7111 fragment identifiers
    /// on the row and its cells.
    pub fn to_atd(&self, metadata: &Metadata) -> JsonValue {
        let table_url = metadata
            .table_url(self.table)
            .map(|u| metadata.context().resolve_link(&u));

        let mut map = JsonMap::new();
        if let Some(url) = &table_url {
            map.insert(
                "@id".to_string(),
                json!(format!("{}#row={}", url, self.source_number)),
            );
        }
        map.insert("@type".to_string(), json!("Row"));
        map.insert("number".to_string(), json!(self.number));
        map.insert("sourceNumber".to_string(), json!(self.source_number));
        if !self.primary_key.is_empty() {
            let keys: Vec<JsonValue> = self
                .primary_key
                .iter()
                .filter_map(|index| self.cells.get(*index))
                .map(|cell| match &table_url {
                    Some(url) => json!(format!(
                        "{}#cell={},{}",
                        url, self.source_number, cell.source_number
                    )),
                    None => cell
                        .value
                        .as_ref()
                        .map(crate::cell::Value::to_json)
                        .unwrap_or(JsonValue::Null),
                })
                .collect();
            map.insert("primaryKey".to_string(), JsonValue::Array(keys));
        }
        if !self.cells.is_empty() {
            map.insert(
                "cells".to_string(),
                JsonValue::Array(
                    self.cells
                        .iter()
                        .map(|cell| cell.to_atd(self.source_number, table_url.as_deref()))
                        .collect(),
                ),
            );
        }
        JsonValue::Object(map)
    }
}

impl Cell {
    pub fn to_atd(&self, row_source_number: u64, table_url: Option<&str>) -> JsonValue {
        let mut map = JsonMap::new();
        if let Some(url) = table_url {
            map.insert(
                "@id".to_string(),
                json!(format!(
                    "{}#cell={},{}",
                    url, row_source_number, self.source_number
                )),
            );
        }
        map.insert("@type".to_string(), json!("Cell"));
        map.insert("stringValue".to_string(), json!(self.string_value));
        if let Some(value) = &self.value {
            map.insert("value".to_string(), value.to_json());
        }
        for (key, url) in [
            ("aboutUrl", &self.about_url),
            ("propertyUrl", &self.property_url),
            ("valueUrl", &self.value_url),
        ] {
            if let Some(url) = url {
                map.insert(key.to_string(), json!(url));
            }
        }
        if !self.errors.is_empty() {
            map.insert("errors".to_string(), json!(self.errors));
        }
        JsonValue::Object(map)
    }
}

fn keep(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Array(items) => !items.is_empty(),
        _ => true,
    }
}
