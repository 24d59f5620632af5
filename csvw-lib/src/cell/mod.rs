//! The cell interpreter: trimming, null mapping, separator splitting,
//! datatype coercion, facet validation and URI-template expansion inputs.

mod datetime;
mod number;
mod value;

pub use number::NumberFormat;
pub use value::{Facets, Value};

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::datatype;
use crate::dialect::DialectOptions;
use crate::metadata::{Metadata, NodeId};

/// A single interpreted cell. Back-references are indices into the metadata
/// graph and the owning row; cells live only for one iteration pass.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Owning column, when the table declares a schema.
    pub column: Option<NodeId>,
    /// 1-based position among the schema's columns.
    pub number: usize,
    /// 1-based position in the source file (after `skipColumns`).
    pub source_number: usize,
    pub string_value: String,
    pub value: Option<Value>,
    pub about_url: Option<String>,
    pub property_url: Option<String>,
    pub value_url: Option<String>,
    pub errors: Vec<String>,
}

/// Outcome of datatype processing for one cell, before URI templates.
pub(crate) struct ProcessedCell {
    pub value: Option<Value>,
    /// Post-processed string form, used as the URI-template variable value.
    pub template_value: String,
    pub errors: Vec<String>,
}

/// Resolved per-column interpretation inputs.
struct ColumnRules {
    base: String,
    datatype_iri: Option<String>,
    format: Option<JsonValue>,
    facets: Facets,
    lang: String,
    default: String,
    null_values: Vec<String>,
    required: bool,
    separator: Option<String>,
}

impl ColumnRules {
    fn resolve(metadata: &Metadata, column: NodeId) -> ColumnRules {
        let (base, datatype_iri, format, facets) = match metadata.resolve_node(column, "datatype")
        {
            Some(datatype) => {
                let node = metadata.node(datatype);
                let base = node
                    .value("base")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("string")
                    .to_string();
                let iri = if datatype::is_builtin(&base) {
                    datatype::builtin_iri(&base).map(str::to_string)
                } else {
                    Some(base.clone())
                };
                (
                    base,
                    iri,
                    node.value("format").cloned(),
                    Facets::from_datatype(metadata, datatype),
                )
            }
            None => ("string".to_string(), None, None, Facets::default()),
        };

        let string_of = |key: &str| {
            metadata
                .resolve(column, key)
                .and_then(|v| v.as_str().map(str::to_string))
        };

        ColumnRules {
            base,
            datatype_iri,
            format,
            facets,
            lang: string_of("lang").unwrap_or_else(|| "und".to_string()),
            default: string_of("default").unwrap_or_default(),
            null_values: metadata
                .resolve(column, "null")
                .and_then(|v| {
                    v.as_array().map(|items| {
                        items
                            .iter()
                            .filter_map(JsonValue::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                })
                .unwrap_or_else(|| vec![String::new()]),
            required: metadata
                .resolve(column, "required")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            separator: string_of("separator"),
        }
    }

    fn lang_tag(&self) -> Option<String> {
        if self.lang == "und" {
            None
        } else {
            Some(self.lang.clone())
        }
    }
}

/// Run the interpretation pipeline for one raw cell string.
pub(crate) fn process_cell(
    metadata: &Metadata,
    column: NodeId,
    raw: &str,
    dialect: &DialectOptions,
) -> ProcessedCell {
    let rules = ColumnRules::resolve(metadata, column);
    let mut errors = Vec::new();

    // Whitespace pre-normalization depends on the datatype family.
    let mut normalized = if datatype::retains_line_structure(&rules.base) {
        raw.to_string()
    } else {
        raw.replace(['\r', '\t', '\u{7}'], " ")
    };
    if !datatype::retains_whitespace(&rules.base) {
        normalized = collapse_whitespace(&normalized);
    }
    if normalized.is_empty() {
        normalized = rules.default.clone();
    }

    let items: Vec<String> = match &rules.separator {
        Some(separator) => normalized
            .split(separator.as_str())
            .map(str::to_string)
            .collect(),
        None => vec![normalized],
    };

    let mut parsed: Vec<Option<Value>> = Vec::with_capacity(items.len());
    for item in &items {
        parsed.push(process_item(item, &rules, dialect, &mut errors));
    }

    let value = match &rules.separator {
        Some(_) => Some(Value::List(parsed)),
        None => parsed.into_iter().next().flatten(),
    };

    let template_value = value.as_ref().map(Value::lexical).unwrap_or_default();

    ProcessedCell {
        value,
        template_value,
        errors,
    }
}

fn process_item(
    item: &str,
    rules: &ColumnRules,
    dialect: &DialectOptions,
    errors: &mut Vec<String>,
) -> Option<Value> {
    let mut item = item.to_string();

    // Strip non-string items; an emptied item picks up the default again.
    if !matches!(rules.base.as_str(), "string" | "anyAtomicType" | "any") {
        item = item.trim().to_string();
        if item.is_empty() {
            item = rules.default.clone();
        }
    }

    if rules.null_values.iter().any(|null| *null == item) {
        if rules.required {
            errors.push("required value is null".to_string());
        }
        return None;
    }

    let item = if datatype::is_string_like(&rules.base) {
        dialect.trim.apply(&item).to_string()
    } else {
        item.trim().to_string()
    };

    // Length facets see the string before datatype parsing reshapes it.
    rules.facets.check_length(&item, errors);

    let result = dispatch_datatype(&item, rules);
    let value = match result {
        Ok(value) => value,
        Err(message) => {
            errors.push(message);
            // Never fatal: fall back to a plain literal of the raw item.
            return Some(Value::String {
                value: item,
                lang: rules.lang_tag(),
            });
        }
    };

    rules.facets.check_bounds(&value, errors);
    Some(value)
}

fn dispatch_datatype(item: &str, rules: &ColumnRules) -> Result<Value, String> {
    let base = rules.base.as_str();

    if datatype::is_unsupported(base) {
        return Err(format!("unsupported datatype {}", base));
    }
    if datatype::is_numeric(base) {
        let format = NumberFormat::from_json(rules.format.as_ref());
        return number::parse_numeric(item, base, &format);
    }
    if base == "boolean" {
        return parse_boolean(item, rules.format.as_ref());
    }
    if datatype::is_date_time_family(base) {
        let format = rules.format.as_ref().and_then(JsonValue::as_str);
        return datetime::parse_date_like(item, base, format);
    }
    if datatype::is_duration_family(base) {
        return datetime::parse_duration(item, base);
    }

    // Everything else: an optional regex format must match in full, and
    // string-family values carry the resolved language.
    if let Some(pattern) = rules.format.as_ref().and_then(JsonValue::as_str) {
        let anchored = format!("^(?:{})$", pattern);
        match Regex::new(&anchored) {
            Ok(regex) => {
                if !regex.is_match(item) {
                    return Err(format!("{} does not match format {}", item, pattern));
                }
            }
            Err(_) => return Err(format!("invalid format pattern {}", pattern)),
        }
    }

    if datatype::is_string_like(base) || base == "anyAtomicType" || base == "any" {
        Ok(Value::String {
            value: item.to_string(),
            lang: rules.lang_tag(),
        })
    } else {
        Ok(Value::Typed {
            value: item.to_string(),
            datatype: rules
                .datatype_iri
                .clone()
                .unwrap_or_else(|| base.to_string()),
        })
    }
}

fn parse_boolean(item: &str, format: Option<&JsonValue>) -> Result<Value, String> {
    if let Some(format) = format.and_then(JsonValue::as_str) {
        if let Some((true_value, false_value)) = format.split_once('|') {
            if item == true_value {
                return Ok(Value::Boolean(true));
            }
            if item == false_value {
                return Ok(Value::Boolean(false));
            }
            return Err(format!("{} is not a valid boolean", item));
        }
    }
    match item.to_lowercase().as_str() {
        "true" | "1" => Ok(Value::Boolean(true)),
        "false" | "0" => Ok(Value::Boolean(false)),
        _ => Err(format!("{} is not a valid boolean", item)),
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParseOptions;
    use serde_json::json;

    fn single_column_metadata(column: JsonValue) -> (Metadata, NodeId) {
        let metadata = Metadata::parse(
            &json!({"tables": [{"url": "t.csv", "tableSchema": {"columns": [column]}}]}),
            ParseOptions::default(),
        )
        .unwrap();
        let column = metadata.table_columns(metadata.tables()[0])[0];
        (metadata, column)
    }

    fn process(column: JsonValue, raw: &str) -> ProcessedCell {
        let (metadata, column) = single_column_metadata(column);
        process_cell(&metadata, column, raw, &DialectOptions::default())
    }

    #[test]
    fn plain_string_cell() {
        let cell = process(json!({"name": "name"}), "Alice");
        assert_eq!(
            cell.value,
            Some(Value::String {
                value: "Alice".into(),
                lang: None
            })
        );
        assert!(cell.errors.is_empty());
    }

    #[test]
    fn integer_cell() {
        let cell = process(json!({"name": "age", "datatype": "integer"}), "30");
        assert_eq!(cell.value, Some(Value::Integer(30)));
        assert_eq!(cell.template_value, "30");
    }

    #[test]
    fn invalid_integer_records_error_and_falls_back() {
        let cell = process(json!({"name": "age", "datatype": "integer"}), "abc");
        assert_eq!(cell.errors, vec!["abc is not a valid integer".to_string()]);
        assert_eq!(
            cell.value,
            Some(Value::String {
                value: "abc".into(),
                lang: None
            })
        );
    }

    #[test]
    fn null_value_yields_none() {
        let cell = process(json!({"name": "x", "null": "NA"}), "NA");
        assert!(cell.value.is_none());
        assert!(cell.errors.is_empty());
    }

    #[test]
    fn required_null_records_error() {
        let cell = process(json!({"name": "x", "null": "NA", "required": true}), "NA");
        assert!(cell.value.is_none());
        assert_eq!(cell.errors, vec!["required value is null".to_string()]);

        let cell = process(json!({"name": "x", "null": "NA", "required": true}), "ok");
        assert!(cell.errors.is_empty());
    }

    #[test]
    fn required_resolves_from_ancestors() {
        let metadata = Metadata::parse(
            &json!({"required": true, "tables": [{"url": "t.csv",
                "tableSchema": {"columns": [{"name": "x"}]}}]}),
            ParseOptions::default(),
        )
        .unwrap();
        let column = metadata.table_columns(metadata.tables()[0])[0];
        let cell = process_cell(&metadata, column, "", &DialectOptions::default());
        assert!(cell.value.is_none());
        assert_eq!(cell.errors, vec!["required value is null".to_string()]);
    }

    #[test]
    fn empty_cell_takes_default() {
        let cell = process(json!({"name": "x", "default": "fallback"}), "");
        assert_eq!(
            cell.value,
            Some(Value::String {
                value: "fallback".into(),
                lang: None
            })
        );
    }

    #[test]
    fn separator_splits_with_default_substitution() {
        let cell = process(
            json!({"name": "tags", "separator": "|", "null": "NA"}),
            "a||c",
        );
        match cell.value {
            Some(Value::List(items)) => {
                assert_eq!(items.len(), 3);
                assert_eq!(
                    items[0],
                    Some(Value::String {
                        value: "a".into(),
                        lang: None
                    })
                );
                // The empty middle entry takes the default "" which is not
                // in the null set here.
                assert_eq!(
                    items[1],
                    Some(Value::String {
                        value: "".into(),
                        lang: None
                    })
                );
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn separator_null_entries_stay_null() {
        let cell = process(json!({"name": "tags", "separator": "|"}), "a||c");
        match cell.value {
            Some(Value::List(items)) => {
                // Default null set is [""]: the middle entry becomes null.
                assert_eq!(items[1], None);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn whitespace_collapses_for_non_string_types() {
        let cell = process(
            json!({"name": "x", "datatype": "token"}),
            "  a \t b  ",
        );
        assert_eq!(
            cell.value,
            Some(Value::String {
                value: "a b".into(),
                lang: None
            })
        );
    }

    #[test]
    fn language_is_attached_to_string_literals() {
        let cell = process(json!({"name": "x", "lang": "en"}), "hello");
        assert_eq!(
            cell.value,
            Some(Value::String {
                value: "hello".into(),
                lang: Some("en".into())
            })
        );
    }

    #[test]
    fn boolean_formats() {
        let cell = process(
            json!({"name": "x", "datatype": {"base": "boolean", "format": "T|F"}}),
            "T",
        );
        assert_eq!(cell.value, Some(Value::Boolean(true)));

        let cell = process(json!({"name": "x", "datatype": "boolean"}), "False");
        assert_eq!(cell.value, Some(Value::Boolean(false)));

        let cell = process(json!({"name": "x", "datatype": "boolean"}), "maybe");
        assert!(!cell.errors.is_empty());
    }

    #[test]
    fn unsupported_datatype_records_error() {
        let cell = process(json!({"name": "x", "datatype": {"base": "ID"}}), "a");
        assert!(cell.errors[0].contains("unsupported datatype"));
    }

    #[test]
    fn format_regex_on_other_types() {
        let cell = process(
            json!({"name": "x", "datatype": {"base": "string", "format": "[0-9]+"}}),
            "abc",
        );
        assert!(cell.errors[0].contains("does not match format"));
    }

    #[test]
    fn length_facet_violation() {
        let cell = process(
            json!({"name": "x", "datatype": {"base": "string", "minLength": 5}}),
            "abc",
        );
        assert!(cell.errors[0].contains("minimum is 5"));
    }

    #[test]
    fn bound_facet_violation() {
        let cell = process(
            json!({"name": "x", "datatype": {"base": "integer", "minInclusive": 0}}),
            "-3",
        );
        assert!(cell.errors[0].contains("violates minInclusive"));
    }

    #[test]
    fn custom_datatype_iri_produces_typed_literal() {
        let cell = process(
            json!({"name": "x", "datatype": {"base": "http://example.org/mine"}}),
            "payload",
        );
        assert_eq!(
            cell.value,
            Some(Value::Typed {
                value: "payload".into(),
                datatype: "http://example.org/mine".into()
            })
        );
    }
}
