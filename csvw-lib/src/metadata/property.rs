//! Static property schemas for the metadata node kinds.
//!
//! Every property belongs to one of seven categories, each with a single
//! validator. Node kinds carry a static table of `(name, category, default)`
//! entries; the parser walks these tables instead of dispatching on property
//! names ad hoc.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value as JsonValue};

use crate::context::is_valid_language_tag;
use crate::datatype;
use crate::uri_template::UriTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    TableGroup,
    Table,
    Schema,
    Column,
    Dialect,
    Transformation,
    Datatype,
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::TableGroup => "TableGroup",
            NodeKind::Table => "Table",
            NodeKind::Schema => "Schema",
            NodeKind::Column => "Column",
            NodeKind::Dialect => "Dialect",
            NodeKind::Transformation => "Template",
            NodeKind::Datatype => "Datatype",
        }
    }

    pub fn from_type_name(name: &str) -> Option<NodeKind> {
        match name {
            "TableGroup" => Some(NodeKind::TableGroup),
            "Table" => Some(NodeKind::Table),
            "Schema" => Some(NodeKind::Schema),
            "Column" => Some(NodeKind::Column),
            "Dialect" => Some(NodeKind::Dialect),
            "Template" => Some(NodeKind::Transformation),
            "Datatype" => Some(NodeKind::Datatype),
            _ => None,
        }
    }

    /// Kinds that take part in inherited-property resolution.
    pub fn carries_inherited(&self) -> bool {
        matches!(
            self,
            NodeKind::TableGroup | NodeKind::Table | NodeKind::Schema | NodeKind::Column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicKind {
    Bool,
    NonNegativeInt,
    SingleChar,
    NullableSingleChar,
    TableDirection,
    TextDirection,
    LanguageTag,
    NullSet,
    TrimMode,
    LineTerminators,
    Encoding,
    TransformSource,
    ColumnName,
    DatatypeBase,
    Format,
    Bound,
    PlainString,
    Notes,
    ForeignKeys,
    TypeName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Link,
    Atomic(AtomicKind),
    Array(NodeKind),
    Object(NodeKind),
    NaturalLanguage,
    ColumnReference,
    UriTemplate,
}

#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub category: Category,
    /// JSON literal text of the documented default, if one exists.
    pub default: Option<&'static str>,
}

const fn prop(name: &'static str, category: Category, default: Option<&'static str>) -> PropertySpec {
    PropertySpec {
        name,
        category,
        default,
    }
}

/// The inherited properties, resolvable on TableGroup, Table, Schema and
/// Column via nearest-ancestor lookup.
pub static INHERITED_PROPERTIES: &[PropertySpec] = &[
    prop("aboutUrl", Category::UriTemplate, None),
    prop("datatype", Category::Object(NodeKind::Datatype), None),
    prop("default", Category::Atomic(AtomicKind::PlainString), Some("\"\"")),
    prop("lang", Category::Atomic(AtomicKind::LanguageTag), Some("\"und\"")),
    prop("null", Category::Atomic(AtomicKind::NullSet), Some("[\"\"]")),
    prop("ordered", Category::Atomic(AtomicKind::Bool), Some("false")),
    prop("propertyUrl", Category::UriTemplate, None),
    prop("required", Category::Atomic(AtomicKind::Bool), Some("false")),
    prop("separator", Category::Atomic(AtomicKind::PlainString), None),
    prop("textDirection", Category::Atomic(AtomicKind::TextDirection), Some("\"ltr\"")),
    prop("valueUrl", Category::UriTemplate, None),
];

static TABLE_GROUP_PROPERTIES: &[PropertySpec] = &[
    prop("@id", Category::Link, None),
    prop("@type", Category::Atomic(AtomicKind::TypeName), None),
    prop("tables", Category::Array(NodeKind::Table), None),
    prop("dialect", Category::Object(NodeKind::Dialect), None),
    prop("notes", Category::Atomic(AtomicKind::Notes), None),
    prop("tableDirection", Category::Atomic(AtomicKind::TableDirection), Some("\"default\"")),
    prop("tableSchema", Category::Object(NodeKind::Schema), None),
    prop("transformations", Category::Array(NodeKind::Transformation), None),
];

static TABLE_PROPERTIES: &[PropertySpec] = &[
    prop("@id", Category::Link, None),
    prop("@type", Category::Atomic(AtomicKind::TypeName), None),
    prop("url", Category::Link, None),
    prop("dialect", Category::Object(NodeKind::Dialect), None),
    prop("notes", Category::Atomic(AtomicKind::Notes), None),
    prop("suppressOutput", Category::Atomic(AtomicKind::Bool), Some("false")),
    prop("tableDirection", Category::Atomic(AtomicKind::TableDirection), Some("\"default\"")),
    prop("tableSchema", Category::Object(NodeKind::Schema), None),
    prop("transformations", Category::Array(NodeKind::Transformation), None),
];

static SCHEMA_PROPERTIES: &[PropertySpec] = &[
    prop("@id", Category::Link, None),
    prop("@type", Category::Atomic(AtomicKind::TypeName), None),
    prop("columns", Category::Array(NodeKind::Column), None),
    prop("foreignKeys", Category::Atomic(AtomicKind::ForeignKeys), None),
    prop("primaryKey", Category::ColumnReference, None),
    prop("rowTitles", Category::ColumnReference, None),
];

static COLUMN_PROPERTIES: &[PropertySpec] = &[
    prop("@id", Category::Link, None),
    prop("@type", Category::Atomic(AtomicKind::TypeName), None),
    prop("name", Category::Atomic(AtomicKind::ColumnName), None),
    prop("suppressOutput", Category::Atomic(AtomicKind::Bool), Some("false")),
    prop("titles", Category::NaturalLanguage, None),
    prop("virtual", Category::Atomic(AtomicKind::Bool), Some("false")),
];

static DIALECT_PROPERTIES: &[PropertySpec] = &[
    prop("@id", Category::Link, None),
    prop("@type", Category::Atomic(AtomicKind::TypeName), None),
    prop("commentPrefix", Category::Atomic(AtomicKind::SingleChar), Some("\"#\"")),
    prop("delimiter", Category::Atomic(AtomicKind::SingleChar), Some("\",\"")),
    prop("doubleQuote", Category::Atomic(AtomicKind::Bool), Some("true")),
    prop("encoding", Category::Atomic(AtomicKind::Encoding), Some("\"utf-8\"")),
    prop("header", Category::Atomic(AtomicKind::Bool), Some("true")),
    // Derived: 1 if header else 0. Resolved in DialectOptions.
    prop("headerRowCount", Category::Atomic(AtomicKind::NonNegativeInt), None),
    prop("lineTerminators", Category::Atomic(AtomicKind::LineTerminators), Some("[\"\\r\\n\",\"\\n\"]")),
    prop("quoteChar", Category::Atomic(AtomicKind::NullableSingleChar), Some("\"\\\"\"")),
    prop("skipBlankRows", Category::Atomic(AtomicKind::Bool), Some("false")),
    prop("skipColumns", Category::Atomic(AtomicKind::NonNegativeInt), Some("0")),
    prop("skipInitialSpace", Category::Atomic(AtomicKind::Bool), Some("false")),
    prop("skipRows", Category::Atomic(AtomicKind::NonNegativeInt), Some("0")),
    // Derived from skipInitialSpace when unset. Resolved in DialectOptions.
    prop("trim", Category::Atomic(AtomicKind::TrimMode), None),
];

static TRANSFORMATION_PROPERTIES: &[PropertySpec] = &[
    prop("@id", Category::Link, None),
    prop("@type", Category::Atomic(AtomicKind::TypeName), None),
    prop("url", Category::Link, None),
    prop("scriptFormat", Category::Link, None),
    prop("targetFormat", Category::Link, None),
    prop("source", Category::Atomic(AtomicKind::TransformSource), None),
    prop("titles", Category::NaturalLanguage, None),
];

static DATATYPE_PROPERTIES: &[PropertySpec] = &[
    prop("@id", Category::Link, None),
    prop("@type", Category::Atomic(AtomicKind::TypeName), None),
    prop("base", Category::Atomic(AtomicKind::DatatypeBase), Some("\"string\"")),
    prop("format", Category::Atomic(AtomicKind::Format), None),
    prop("length", Category::Atomic(AtomicKind::NonNegativeInt), None),
    prop("minLength", Category::Atomic(AtomicKind::NonNegativeInt), None),
    prop("maxLength", Category::Atomic(AtomicKind::NonNegativeInt), None),
    prop("minimum", Category::Atomic(AtomicKind::Bound), None),
    prop("maximum", Category::Atomic(AtomicKind::Bound), None),
    prop("minInclusive", Category::Atomic(AtomicKind::Bound), None),
    prop("maxInclusive", Category::Atomic(AtomicKind::Bound), None),
    prop("minExclusive", Category::Atomic(AtomicKind::Bound), None),
    prop("maxExclusive", Category::Atomic(AtomicKind::Bound), None),
];

pub fn own_properties(kind: NodeKind) -> &'static [PropertySpec] {
    match kind {
        NodeKind::TableGroup => TABLE_GROUP_PROPERTIES,
        NodeKind::Table => TABLE_PROPERTIES,
        NodeKind::Schema => SCHEMA_PROPERTIES,
        NodeKind::Column => COLUMN_PROPERTIES,
        NodeKind::Dialect => DIALECT_PROPERTIES,
        NodeKind::Transformation => TRANSFORMATION_PROPERTIES,
        NodeKind::Datatype => DATATYPE_PROPERTIES,
    }
}

/// Look up a property spec on a kind, falling back to the inherited table
/// for kinds that carry inherited properties.
pub fn spec_for(kind: NodeKind, name: &str) -> Option<&'static PropertySpec> {
    own_properties(kind)
        .iter()
        .find(|spec| spec.name == name)
        .or_else(|| {
            if kind.carries_inherited() {
                INHERITED_PROPERTIES.iter().find(|spec| spec.name == name)
            } else {
                None
            }
        })
}

pub fn default_value(spec: &PropertySpec) -> Option<JsonValue> {
    spec.default
        .map(|text| serde_json::from_str(text).expect("valid default literal"))
}

/// Required properties per kind; absence is a validation error, not a
/// construction warning.
pub fn required_properties(kind: NodeKind) -> &'static [&'static str] {
    match kind {
        NodeKind::TableGroup => &["tables"],
        NodeKind::Table => &["url"],
        NodeKind::Transformation => &["url", "targetFormat", "scriptFormat"],
        _ => &[],
    }
}

static COLUMN_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9]|%[0-9A-Fa-f]{2})(?:[A-Za-z0-9._]|%[0-9A-Fa-f]{2})*$")
        .expect("valid regex")
});

pub fn is_valid_column_name(name: &str) -> bool {
    COLUMN_NAME_RE.is_match(name)
}

/// Validate an atomic property value, returning the canonical stored form.
/// The `Err` carries the warning text; the caller substitutes the default
/// (or drops the slot) and records the warning.
pub fn validate_atomic(kind: AtomicKind, value: &JsonValue) -> Result<JsonValue, String> {
    match kind {
        AtomicKind::Bool => match value {
            JsonValue::Bool(b) => Ok(json!(b)),
            JsonValue::String(s) if s == "true" || s == "1" => Ok(json!(true)),
            JsonValue::String(s) if s == "false" || s == "0" => Ok(json!(false)),
            other => Err(format!("expected boolean, found {}", other)),
        },
        AtomicKind::NonNegativeInt => match value {
            JsonValue::Number(n) if n.as_u64().is_some() => Ok(value.clone()),
            JsonValue::String(s) => s
                .parse::<u64>()
                .map(|n| json!(n))
                .map_err(|_| format!("expected non-negative integer, found \"{}\"", s)),
            other => Err(format!("expected non-negative integer, found {}", other)),
        },
        AtomicKind::SingleChar => match value {
            JsonValue::String(s) if s.chars().count() == 1 => Ok(value.clone()),
            other => Err(format!("expected single character, found {}", other)),
        },
        AtomicKind::NullableSingleChar => match value {
            JsonValue::Null => Ok(JsonValue::Null),
            JsonValue::String(s) if s.chars().count() == 1 => Ok(value.clone()),
            other => Err(format!("expected single character or null, found {}", other)),
        },
        AtomicKind::TableDirection => match value.as_str() {
            Some(s @ ("rtl" | "ltr" | "default")) => Ok(json!(s)),
            _ => Err(format!(
                "expected one of rtl, ltr, default, found {}",
                value
            )),
        },
        AtomicKind::TextDirection => match value.as_str() {
            Some(s @ ("ltr" | "rtl" | "auto" | "inherit")) => Ok(json!(s)),
            _ => Err(format!(
                "expected one of ltr, rtl, auto, inherit, found {}",
                value
            )),
        },
        AtomicKind::LanguageTag => match value.as_str() {
            Some(s) if is_valid_language_tag(s) => Ok(value.clone()),
            _ => Err(format!("expected BCP47 language tag, found {}", value)),
        },
        AtomicKind::NullSet => match value {
            JsonValue::String(s) => Ok(json!([s])),
            JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => Ok(value.clone()),
            other => Err(format!(
                "expected string or array of strings, found {}",
                other
            )),
        },
        AtomicKind::TrimMode => match value {
            JsonValue::Bool(b) => Ok(json!(b.to_string())),
            JsonValue::String(s) if matches!(s.as_str(), "true" | "false" | "start" | "end") => {
                Ok(value.clone())
            }
            other => Err(format!(
                "expected true, false, start or end, found {}",
                other
            )),
        },
        AtomicKind::LineTerminators => match value {
            JsonValue::String(s) => Ok(json!([s])),
            JsonValue::Array(items)
                if !items.is_empty() && items.iter().all(JsonValue::is_string) =>
            {
                Ok(value.clone())
            }
            other => Err(format!(
                "expected string or array of strings, found {}",
                other
            )),
        },
        AtomicKind::Encoding => match value.as_str() {
            Some(_) => Ok(value.clone()),
            None => Err(format!("expected encoding name, found {}", value)),
        },
        AtomicKind::TransformSource => match value.as_str() {
            Some(s @ ("json" | "rdf")) => Ok(json!(s)),
            _ => Err(format!("expected json or rdf, found {}", value)),
        },
        AtomicKind::ColumnName => match value.as_str() {
            Some(s) if s.starts_with('_') => {
                Err(format!("column name \"{}\" uses the reserved _ prefix", s))
            }
            Some(s) if is_valid_column_name(s) => Ok(value.clone()),
            _ => Err(format!("invalid column name {}", value)),
        },
        AtomicKind::DatatypeBase => match value.as_str() {
            Some(s)
                if datatype::is_builtin(s)
                    || datatype::is_unsupported(s)
                    || url::Url::parse(s).is_ok() =>
            {
                Ok(value.clone())
            }
            _ => Err(format!(
                "expected built-in datatype name or absolute IRI, found {}",
                value
            )),
        },
        AtomicKind::Format => match value {
            JsonValue::String(_) => Ok(value.clone()),
            JsonValue::Object(map) => {
                for key in map.keys() {
                    if !matches!(key.as_str(), "pattern" | "decimalChar" | "groupChar") {
                        return Err(format!("unknown format key \"{}\"", key));
                    }
                }
                Ok(value.clone())
            }
            other => Err(format!("expected string or format object, found {}", other)),
        },
        AtomicKind::Bound => match value {
            JsonValue::Number(_) | JsonValue::String(_) => Ok(value.clone()),
            other => Err(format!(
                "expected numeric or date/time literal, found {}",
                other
            )),
        },
        AtomicKind::PlainString => match value {
            JsonValue::String(_) => Ok(value.clone()),
            other => Err(format!("expected string, found {}", other)),
        },
        AtomicKind::Notes => match value {
            JsonValue::Array(_) => Ok(value.clone()),
            other => Ok(json!([other])),
        },
        AtomicKind::ForeignKeys => match value {
            JsonValue::Array(items) if items.iter().all(JsonValue::is_object) => Ok(value.clone()),
            other => Err(format!("expected array of objects, found {}", other)),
        },
        AtomicKind::TypeName => match value.as_str() {
            Some(_) => Ok(value.clone()),
            None => Err(format!("expected type name, found {}", value)),
        },
    }
}

/// Validate a natural-language property, normalizing to the language-map
/// form. Unknown language tags fall back to `und`.
pub fn validate_natural_language(value: &JsonValue) -> Result<JsonValue, String> {
    fn values_of(value: &JsonValue) -> Option<Vec<String>> {
        match value {
            JsonValue::String(s) => Some(vec![s.clone()]),
            JsonValue::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    match value {
        JsonValue::String(_) | JsonValue::Array(_) => {
            let values = values_of(value)
                .ok_or_else(|| format!("expected strings, found {}", value))?;
            Ok(json!({ "und": values }))
        }
        JsonValue::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (tag, v) in map {
                let values =
                    values_of(v).ok_or_else(|| format!("expected strings under \"{}\"", tag))?;
                let key = if is_valid_language_tag(tag) {
                    tag.clone()
                } else {
                    "und".to_string()
                };
                let entry = normalized
                    .entry(key)
                    .or_insert_with(|| JsonValue::Array(Vec::new()));
                if let JsonValue::Array(list) = entry {
                    for value in values {
                        list.push(json!(value));
                    }
                }
            }
            Ok(JsonValue::Object(normalized))
        }
        other => Err(format!(
            "expected string, array or language map, found {}",
            other
        )),
    }
}

/// Validate a column-reference property, normalizing to an array of column
/// names. Existence of the referenced columns is checked during validation.
pub fn validate_column_reference(value: &JsonValue) -> Result<JsonValue, String> {
    match value {
        JsonValue::String(s) => Ok(json!([s])),
        JsonValue::Array(items)
            if !items.is_empty() && items.iter().all(JsonValue::is_string) =>
        {
            Ok(value.clone())
        }
        other => Err(format!(
            "expected column name or array of column names, found {}",
            other
        )),
    }
}

pub fn validate_link(value: &JsonValue) -> Result<JsonValue, String> {
    match value {
        JsonValue::String(_) => Ok(value.clone()),
        other => Err(format!("expected URL string, found {}", other)),
    }
}

pub fn validate_uri_template(value: &JsonValue) -> Result<JsonValue, String> {
    match value.as_str() {
        Some(s) => {
            UriTemplate::parse(s)?;
            Ok(value.clone())
        }
        None => Err(format!("expected URI template string, found {}", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_bool_accepts_string_forms() {
        assert_eq!(validate_atomic(AtomicKind::Bool, &json!("true")).unwrap(), json!(true));
        assert_eq!(validate_atomic(AtomicKind::Bool, &json!("0")).unwrap(), json!(false));
        assert!(validate_atomic(AtomicKind::Bool, &json!("yes")).is_err());
    }

    #[test]
    fn single_char_rejects_longer_strings() {
        assert!(validate_atomic(AtomicKind::SingleChar, &json!(";")).is_ok());
        assert!(validate_atomic(AtomicKind::SingleChar, &json!(";;")).is_err());
        assert!(validate_atomic(AtomicKind::NullableSingleChar, &JsonValue::Null).is_ok());
    }

    #[test]
    fn column_names() {
        assert!(is_valid_column_name("age"));
        assert!(is_valid_column_name("a.b_c"));
        assert!(is_valid_column_name("%C3%A5ge"));
        assert!(!is_valid_column_name(""));
        assert!(!is_valid_column_name("has space"));
        assert!(validate_atomic(AtomicKind::ColumnName, &json!("_col.1")).is_err());
    }

    #[test]
    fn natural_language_forms_normalize_to_map() {
        assert_eq!(
            validate_natural_language(&json!("Name")).unwrap(),
            json!({"und": ["Name"]})
        );
        assert_eq!(
            validate_natural_language(&json!(["Name", "Title"])).unwrap(),
            json!({"und": ["Name", "Title"]})
        );
        assert_eq!(
            validate_natural_language(&json!({"en": "Name", "!!": "Fallback"})).unwrap(),
            json!({"en": ["Name"], "und": ["Fallback"]})
        );
    }

    #[test]
    fn null_set_normalizes_to_array() {
        assert_eq!(
            validate_atomic(AtomicKind::NullSet, &json!("NA")).unwrap(),
            json!(["NA"])
        );
        assert!(validate_atomic(AtomicKind::NullSet, &json!([1, 2])).is_err());
    }

    #[test]
    fn datatype_base_accepts_builtin_unsupported_and_iri() {
        assert!(validate_atomic(AtomicKind::DatatypeBase, &json!("integer")).is_ok());
        assert!(validate_atomic(AtomicKind::DatatypeBase, &json!("anyType")).is_ok());
        assert!(
            validate_atomic(AtomicKind::DatatypeBase, &json!("http://example.org/t")).is_ok()
        );
        assert!(validate_atomic(AtomicKind::DatatypeBase, &json!("nope")).is_err());
    }

    #[test]
    fn spec_lookup_walks_inherited_table() {
        assert!(spec_for(NodeKind::Column, "name").is_some());
        assert!(spec_for(NodeKind::Column, "separator").is_some());
        assert!(spec_for(NodeKind::Dialect, "separator").is_none());
        assert_eq!(
            default_value(spec_for(NodeKind::Column, "lang").unwrap()),
            Some(json!("und"))
        );
    }
}
