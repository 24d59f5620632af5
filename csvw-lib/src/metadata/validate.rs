//! Validation over the parsed graph. Produces a sequence of error strings;
//! an empty sequence means the metadata is valid.

use serde_json::Value as JsonValue;
use tracing::debug;

use super::{Metadata, NodeId, NodeKind, Slot};
use crate::datatype;
use crate::error::CsvwError;

impl Metadata {
    /// Collect validation errors across the whole graph.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for id in self.node_ids() {
            self.validate_node(id, &mut errors);
        }
        if self.tables().is_empty() {
            errors.push("a table group requires at least one table".to_string());
        } else {
            self.validate_table_urls_unique(&mut errors);
        }
        debug!("validation finished with {} error(s)", errors.len());
        errors
    }

    /// Validation that fails with a grouped multi-line error.
    pub fn validate_strict(&self) -> Result<(), CsvwError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CsvwError::MetadataValidation(errors))
        }
    }

    fn validate_node(&self, id: NodeId, errors: &mut Vec<String>) {
        let node = self.node(id);

        if let Some(type_name) = node.value("@type").and_then(JsonValue::as_str) {
            if type_name != node.kind.type_name() {
                errors.push(format!(
                    "@type '{}' does not match expected '{}'",
                    type_name,
                    node.kind.type_name()
                ));
            }
        }

        if let Some(at_id) = node.value("@id").and_then(JsonValue::as_str) {
            if at_id.starts_with("_:") {
                errors.push(format!("@id must not begin with '_:': {}", at_id));
            }
        }

        for required in super::property::required_properties(node.kind) {
            if node.slot(required).is_none() {
                errors.push(format!(
                    "{} requires property '{}'",
                    node.kind.type_name(),
                    required
                ));
            }
        }

        match node.kind {
            NodeKind::Schema => self.validate_schema(id, errors),
            NodeKind::Datatype => self.validate_datatype(id, errors),
            _ => {}
        }
    }

    fn validate_table_urls_unique(&self, errors: &mut Vec<String>) {
        let mut seen: Vec<String> = Vec::new();
        for table in self.tables() {
            if let Some(url) = self.table_url(table) {
                let resolved = self.context().resolve_link(&url);
                if seen.contains(&resolved) {
                    errors.push(format!("duplicate table url: {}", resolved));
                } else {
                    seen.push(resolved);
                }
            }
        }
    }

    fn validate_schema(&self, id: NodeId, errors: &mut Vec<String>) {
        let columns = self.columns_of(id);
        let names: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| self.column_name(*col, i + 1))
            .collect();

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                errors.push(format!("duplicate column name: {}", name));
            }
        }

        let mut seen_virtual = false;
        for column in &columns {
            if self.is_virtual(*column) {
                seen_virtual = true;
            } else if seen_virtual {
                errors.push(
                    "virtual columns must follow all non-virtual columns".to_string(),
                );
                break;
            }
        }

        for key in ["primaryKey", "rowTitles"] {
            if let Some(Slot::Value(JsonValue::Array(refs))) = self.node(id).slot(key) {
                for column_ref in refs.iter().filter_map(JsonValue::as_str) {
                    if !names.iter().any(|n| n == column_ref) {
                        errors.push(format!(
                            "invalid property '{}': column {} not found",
                            key, column_ref
                        ));
                    }
                }
            }
        }

        if let Some(Slot::Value(JsonValue::Array(keys))) = self.node(id).slot("foreignKeys") {
            for key in keys {
                self.validate_foreign_key(key, &names, errors);
            }
        }
    }

    fn validate_foreign_key(
        &self,
        key: &JsonValue,
        column_names: &[String],
        errors: &mut Vec<String>,
    ) {
        let obj = match key.as_object() {
            Some(obj) => obj,
            None => {
                errors.push(format!("invalid property 'foreignKeys': {}", key));
                return;
            }
        };

        // `columns` tolerated as a legacy alias for `columnReference`.
        let column_reference = obj.get("columnReference").or_else(|| obj.get("columns"));
        let reference = obj.get("reference");

        for unexpected in obj
            .keys()
            .filter(|k| !matches!(k.as_str(), "columnReference" | "columns" | "reference"))
        {
            errors.push(format!(
                "invalid property 'foreignKeys': unexpected key '{}'",
                unexpected
            ));
        }

        let (column_reference, reference) = match (column_reference, reference) {
            (Some(c), Some(r)) => (c, r),
            _ => {
                errors.push(
                    "invalid property 'foreignKeys': requires columnReference and reference"
                        .to_string(),
                );
                return;
            }
        };

        for column_ref in column_reference_names(column_reference) {
            if !column_names.iter().any(|n| n == &column_ref) {
                errors.push(format!(
                    "invalid property 'foreignKeys': column {} not found",
                    column_ref
                ));
            }
        }

        let reference = match reference.as_object() {
            Some(reference) => reference,
            None => {
                errors.push(format!(
                    "invalid property 'foreignKeys': reference must be an object, found {}",
                    reference
                ));
                return;
            }
        };

        let resource = reference.get("resource").and_then(JsonValue::as_str);
        let schema_reference = reference.get("schemaReference").and_then(JsonValue::as_str);

        match (resource, schema_reference) {
            (Some(_), Some(_)) => {
                errors.push(
                    "invalid property 'foreignKeys': reference must not carry both resource \
                     and schemaReference"
                        .to_string(),
                );
                return;
            }
            (None, None) => {
                errors.push(
                    "invalid property 'foreignKeys': reference requires resource or \
                     schemaReference"
                        .to_string(),
                );
                return;
            }
            _ => {}
        }

        let target_schema = if let Some(resource) = resource {
            let resolved = self.context().resolve_link(resource);
            let matches: Vec<NodeId> = self
                .tables()
                .into_iter()
                .filter(|t| {
                    self.table_url(*t)
                        .map(|u| self.context().resolve_link(&u) == resolved)
                        .unwrap_or(false)
                })
                .collect();
            if matches.len() != 1 {
                errors.push(format!(
                    "invalid property 'foreignKeys': table referenced by {} not found",
                    resolved
                ));
                return;
            }
            self.schema_of(matches[0])
        } else {
            let schema_id = self
                .context()
                .resolve_link(schema_reference.expect("checked above"));
            let matches: Vec<NodeId> = self
                .tables()
                .into_iter()
                .filter_map(|t| self.schema_of(t))
                .filter(|s| {
                    self.node(*s)
                        .value("@id")
                        .and_then(JsonValue::as_str)
                        .map(|i| self.context().resolve_link(i) == schema_id)
                        .unwrap_or(false)
                })
                .collect();
            if matches.len() != 1 {
                errors.push(format!(
                    "invalid property 'foreignKeys': schema referenced by {} not found",
                    schema_id
                ));
                return;
            }
            Some(matches[0])
        };

        if let Some(target) = target_schema {
            let target_names: Vec<String> = self
                .columns_of(target)
                .iter()
                .enumerate()
                .map(|(i, col)| self.column_name(*col, i + 1))
                .collect();
            if let Some(target_ref) = reference.get("columnReference") {
                for column_ref in column_reference_names(target_ref) {
                    if !target_names.iter().any(|n| n == &column_ref) {
                        errors.push(format!(
                            "invalid property 'foreignKeys': referenced column {} not found",
                            column_ref
                        ));
                    }
                }
            }
        }
    }

    fn validate_datatype(&self, id: NodeId, errors: &mut Vec<String>) {
        let node = self.node(id);
        let base = node
            .value("base")
            .and_then(JsonValue::as_str)
            .unwrap_or("string");

        if let Some(length) = node.value("length").and_then(JsonValue::as_u64) {
            for facet in ["minLength", "maxLength"] {
                if let Some(other) = node.value(facet).and_then(JsonValue::as_u64) {
                    if other != length {
                        errors.push(format!(
                            "datatype length {} conflicts with {} {}",
                            length, facet, other
                        ));
                    }
                }
            }
        }

        let has_bounds = [
            "minimum",
            "maximum",
            "minInclusive",
            "maxInclusive",
            "minExclusive",
            "maxExclusive",
        ]
        .iter()
        .any(|facet| node.value(facet).is_some());

        if has_bounds && !datatype::is_ordered(base) {
            errors.push(format!(
                "datatype {} does not admit minimum/maximum facets",
                base
            ));
        }
    }
}

fn column_reference_names(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::String(s) => vec![s.clone()],
        JsonValue::Array(items) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
