//! Merge semantics: combining user-supplied metadata with metadata that
//! arrives later, e.g. embedded metadata extracted from a CSV header.

use serde_json::{map::Entry, Map as JsonMap, Value as JsonValue};

use super::{Metadata, NodeKind, ParseOptions};
use crate::error::CsvwError;
use crate::metadata::property::{self, AtomicKind, Category};

impl Metadata {
    /// Merge `other` into `self`, with `self` taking precedence for scalar
    /// properties. Operates on the canonical JSON forms, then re-parses.
    pub fn merge(&self, other: &Metadata) -> Result<Metadata, CsvwError> {
        let mut a = self.to_json();
        let b = other.to_json();

        match (a.as_object_mut(), b) {
            (Some(a_map), JsonValue::Object(b_map)) => {
                merge_node(NodeKind::TableGroup, a_map, b_map)?;
            }
            _ => return Err(CsvwError::Merge("metadata must be objects".to_string())),
        }

        let options = ParseOptions {
            base: self.context().base().cloned(),
            default_language: self.context().language().map(str::to_string),
            type_hint: Some(NodeKind::TableGroup),
        };
        let mut merged = Metadata::parse(&a, options)?;
        merged.diagnostics = self.diagnostics.clone();
        merged.diagnostics.merge(other.diagnostics.clone());
        Ok(merged)
    }

    /// Check that embedded metadata (from a CSV header) is compatible with
    /// this user-supplied metadata: URLs must match, the non-virtual column
    /// count must equal the embedded column count, and at each index the
    /// name/title sets must intersect.
    pub fn verify_compatible(&self, embedded: &Metadata) -> Result<(), CsvwError> {
        for embedded_table in embedded.tables() {
            let embedded_url = embedded
                .table_url(embedded_table)
                .map(|u| embedded.context().resolve_link(&u))
                .ok_or_else(|| CsvwError::Merge("embedded table has no url".to_string()))?;

            let user_table = self
                .tables()
                .into_iter()
                .find(|t| {
                    self.table_url(*t)
                        .map(|u| self.context().resolve_link(&u) == embedded_url)
                        .unwrap_or(false)
                })
                .ok_or_else(|| {
                    CsvwError::Merge(format!("no table matches url {}", embedded_url))
                })?;

            let user_columns: Vec<_> = self
                .table_columns(user_table)
                .into_iter()
                .filter(|c| !self.is_virtual(*c))
                .collect();
            let embedded_columns = embedded.table_columns(embedded_table);

            if user_columns.is_empty() {
                continue;
            }
            if user_columns.len() != embedded_columns.len() {
                return Err(CsvwError::Merge(format!(
                    "table {} has {} non-virtual columns, input has {}",
                    embedded_url,
                    user_columns.len(),
                    embedded_columns.len()
                )));
            }

            for (index, (user_col, embedded_col)) in
                user_columns.iter().zip(embedded_columns.iter()).enumerate()
            {
                let mut user_names = title_set(
                    self.node(*user_col).value("name"),
                    self.node(*user_col).value("titles"),
                );
                let embedded_names = title_set(
                    embedded.node(*embedded_col).value("name"),
                    embedded.node(*embedded_col).value("titles"),
                );
                // A column with no name and no titles matches anything.
                if user_names.is_empty() || embedded_names.is_empty() {
                    continue;
                }
                user_names.retain(|n| embedded_names.contains(n));
                if user_names.is_empty() {
                    return Err(CsvwError::Merge(format!(
                        "column {} of {} does not match the input header",
                        index + 1,
                        embedded_url
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Pooled, lowercased name/title set used for column compatibility. Titles
/// under `und` land in the same pool, which makes them match any language.
fn title_set(name: Option<&JsonValue>, titles: Option<&JsonValue>) -> Vec<String> {
    let mut set = Vec::new();
    if let Some(name) = name.and_then(JsonValue::as_str) {
        set.push(name.to_lowercase());
    }
    if let Some(JsonValue::Object(map)) = titles {
        for values in map.values() {
            if let Some(values) = values.as_array() {
                for value in values.iter().filter_map(JsonValue::as_str) {
                    let lowered = value.to_lowercase();
                    if !set.contains(&lowered) {
                        set.push(lowered);
                    }
                }
            }
        }
    }
    set
}

fn merge_node(
    kind: NodeKind,
    a: &mut JsonMap<String, JsonValue>,
    b: JsonMap<String, JsonValue>,
) -> Result<(), CsvwError> {
    for (key, b_value) in b {
        if key == "@context" {
            continue;
        }
        match a.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(b_value);
            }
            Entry::Occupied(mut slot) => {
                merge_property(kind, &key, slot.get_mut(), b_value)?;
            }
        }
    }
    Ok(())
}

fn merge_property(
    kind: NodeKind,
    key: &str,
    a: &mut JsonValue,
    b: JsonValue,
) -> Result<(), CsvwError> {
    let spec = match property::spec_for(kind, key) {
        Some(spec) => spec,
        // Annotations and anything unrecognized: the earlier document wins.
        None => return Ok(()),
    };

    match spec.category {
        Category::Array(NodeKind::Table) => merge_keyed_arrays(a, b, &table_key),
        Category::Array(NodeKind::Transformation) => merge_keyed_arrays(a, b, &transformation_key),
        Category::Array(NodeKind::Column) => merge_columns(a, b),
        Category::Array(_) => Ok(()),
        Category::Object(child_kind) => {
            // A bare string URL wins over an object form.
            if a.is_string() {
                return Ok(());
            }
            if b.is_string() {
                *a = b;
                return Ok(());
            }
            match (a.as_object_mut(), b) {
                (Some(a_map), JsonValue::Object(b_map)) => merge_node(child_kind, a_map, b_map),
                _ => Ok(()),
            }
        }
        Category::NaturalLanguage => {
            merge_natural_language(a, b);
            Ok(())
        }
        Category::Atomic(AtomicKind::Notes) => {
            if let (JsonValue::Array(a_items), JsonValue::Array(b_items)) = (&mut *a, b) {
                a_items.extend(b_items);
            }
            Ok(())
        }
        // Scalars and links: A wins.
        _ => Ok(()),
    }
}

fn table_key(table: &JsonValue) -> Option<String> {
    table
        .get("url")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn transformation_key(transformation: &JsonValue) -> Option<String> {
    let target = transformation.get("targetFormat").and_then(JsonValue::as_str);
    let script = transformation.get("scriptFormat").and_then(JsonValue::as_str);
    Some(format!("{}\u{0}{}", target.unwrap_or(""), script.unwrap_or("")))
}

fn merge_keyed_arrays(
    a: &mut JsonValue,
    b: JsonValue,
    key_of: &dyn Fn(&JsonValue) -> Option<String>,
) -> Result<(), CsvwError> {
    let (a_items, b_items) = match (a.as_array_mut(), b) {
        (Some(a_items), JsonValue::Array(b_items)) => (a_items, b_items),
        _ => return Ok(()),
    };
    for b_item in b_items {
        let b_key = key_of(&b_item);
        let existing = a_items.iter_mut().find(|a_item| {
            b_key.is_some() && key_of(a_item) == b_key
        });
        match existing {
            Some(a_item) => {
                let kind = if a_item.get("targetFormat").is_some() {
                    NodeKind::Transformation
                } else {
                    NodeKind::Table
                };
                if let (Some(a_map), JsonValue::Object(b_map)) = (a_item.as_object_mut(), b_item) {
                    merge_node(kind, a_map, b_map)?;
                }
            }
            None => a_items.push(b_item),
        }
    }
    Ok(())
}

fn merge_columns(a: &mut JsonValue, b: JsonValue) -> Result<(), CsvwError> {
    let (a_items, b_items) = match (a.as_array_mut(), b) {
        (Some(a_items), JsonValue::Array(b_items)) => (a_items, b_items),
        _ => return Ok(()),
    };

    for (index, b_item) in b_items.into_iter().enumerate() {
        if index < a_items.len() {
            let a_item = &mut a_items[index];
            if !columns_align(a_item, &b_item) {
                if is_virtual_column(a_item) || is_virtual_column(&b_item) {
                    a_items.push(b_item);
                    continue;
                }
                return Err(CsvwError::Merge(format!(
                    "cannot align column {} across metadata documents",
                    index + 1
                )));
            }
            if let (Some(a_map), JsonValue::Object(b_map)) = (a_item.as_object_mut(), b_item) {
                merge_node(NodeKind::Column, a_map, b_map)?;
            }
        } else {
            a_items.push(b_item);
        }
    }
    Ok(())
}

fn is_virtual_column(column: &JsonValue) -> bool {
    column
        .get("virtual")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
}

fn columns_align(a: &JsonValue, b: &JsonValue) -> bool {
    let a_set = title_set(a.get("name"), a.get("titles"));
    let b_set = title_set(b.get("name"), b.get("titles"));
    if a_set.is_empty() || b_set.is_empty() {
        return true;
    }
    a_set.iter().any(|n| b_set.contains(n))
}

fn merge_natural_language(a: &mut JsonValue, b: JsonValue) {
    let (a_map, b_map) = match (a.as_object_mut(), b) {
        (Some(a_map), JsonValue::Object(b_map)) => (a_map, b_map),
        _ => return,
    };

    for (language, b_values) in b_map {
        let b_values = match b_values {
            JsonValue::Array(values) => values,
            other => vec![other],
        };
        let entry = a_map
            .entry(language)
            .or_insert_with(|| JsonValue::Array(Vec::new()));
        if let JsonValue::Array(a_values) = entry {
            for value in b_values {
                if !a_values.contains(&value) {
                    a_values.push(value);
                }
            }
        }
    }

    // Values under `und` that also appear under a concrete language are
    // dropped.
    let tagged: Vec<JsonValue> = a_map
        .iter()
        .filter(|(language, _)| language.as_str() != "und")
        .filter_map(|(_, values)| values.as_array())
        .flatten()
        .cloned()
        .collect();
    let mut drop_und = false;
    if let Some(JsonValue::Array(und_values)) = a_map.get_mut("und") {
        und_values.retain(|v| !tagged.contains(v));
        drop_und = und_values.is_empty();
    }
    if drop_und {
        a_map.remove("und");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(json: JsonValue) -> Metadata {
        Metadata::parse(&json, ParseOptions::default()).unwrap()
    }

    #[test]
    fn merge_identity() {
        let a = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "a", "titles": "A"}
        ]}}]}));
        let empty = parse(json!({"tables": []}));
        let merged = a.merge(&empty).unwrap();
        assert_eq!(merged.to_json(), a.to_json());
    }

    #[test]
    fn tables_merge_by_url() {
        let a = parse(json!({"tables": [{"url": "t.csv", "suppressOutput": true}]}));
        let b = parse(json!({"tables": [
            {"url": "t.csv", "tableSchema": {"columns": [{"name": "x"}]}},
            {"url": "u.csv"}
        ]}));
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.tables().len(), 2);
        let first = merged.tables()[0];
        // A's scalar wins, B's schema arrives.
        assert_eq!(merged.node(first).value("suppressOutput"), Some(&json!(true)));
        assert!(merged.schema_of(first).is_some());
    }

    #[test]
    fn merge_is_associative_over_tables() {
        let a = parse(json!({"tables": [{"url": "a.csv"}]}));
        let b = parse(json!({"tables": [{"url": "b.csv"}]}));
        let c = parse(json!({"tables": [{"url": "c.csv"}]}));
        let left = a.merge(&b).unwrap().merge(&c).unwrap();
        let right = a.merge(&b.merge(&c).unwrap()).unwrap();
        let urls = |m: &Metadata| -> Vec<String> {
            m.tables().iter().filter_map(|t| m.table_url(*t)).collect()
        };
        assert_eq!(urls(&left), urls(&right));
    }

    #[test]
    fn scalars_prefer_the_first_document() {
        let a = parse(json!({"tables": [{"url": "t.csv", "tableDirection": "rtl"}]}));
        let b = parse(json!({"tables": [{"url": "t.csv", "tableDirection": "ltr"}]}));
        let merged = a.merge(&b).unwrap();
        let table = merged.tables()[0];
        assert_eq!(
            merged.node(table).value("tableDirection"),
            Some(&json!("rtl"))
        );
    }

    #[test]
    fn columns_align_by_title_intersection() {
        let a = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "name", "titles": "Name"}
        ]}}]}));
        let b = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"titles": "NAME"}
        ]}}]}));
        let merged = a.merge(&b).unwrap();
        let col = merged.table_columns(merged.tables()[0])[0];
        assert_eq!(merged.node(col).value("name"), Some(&json!("name")));
    }

    #[test]
    fn misaligned_columns_fail() {
        let a = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "age", "titles": "Age"}
        ]}}]}));
        let b = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"titles": "Height"}
        ]}}]}));
        assert!(matches!(a.merge(&b), Err(CsvwError::Merge(_))));
    }

    #[test]
    fn natural_language_merge_dedupes_und() {
        let mut a = json!({"en": ["Name"], "und": ["Name", "Label"]});
        merge_natural_language(&mut a, json!({"en": ["Name", "Title"]}));
        assert_eq!(a, json!({"en": ["Name", "Title"], "und": ["Label"]}));
    }

    #[test]
    fn notes_concatenate() {
        let a = parse(json!({"tables": [{"url": "t.csv"}], "notes": ["one"]}));
        let b = parse(json!({"tables": [{"url": "t.csv"}], "notes": ["two"]}));
        let merged = a.merge(&b).unwrap();
        assert_eq!(
            merged.node(merged.root()).value("notes"),
            Some(&json!(["one", "two"]))
        );
    }

    #[test]
    fn verify_compatible_checks_headers() {
        let user = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"name": "name"}, {"name": "age"}
        ]}}]}));
        let embedded = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"titles": "name"}, {"titles": "age"}
        ]}}]}));
        assert!(user.verify_compatible(&embedded).is_ok());

        let mismatched = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"titles": "name"}, {"titles": "height"}
        ]}}]}));
        assert!(user.verify_compatible(&mismatched).is_err());

        let wrong_count = parse(json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [
            {"titles": "name"}
        ]}}]}));
        assert!(user.verify_compatible(&wrong_count).is_err());
    }
}
