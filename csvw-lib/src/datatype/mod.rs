//! Datatype registry: maps CSVW datatype names to canonical IRIs and carries
//! the built-in subtype lattice used for compatibility checks.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::context::{CSVW_NS, RDF_NS, XSD_NS};

/// CSVW datatype names with their canonical IRIs. Includes the CSVW aliases
/// (`number`, `binary`, `datetime`, `any`, `xml`, `html`, `json`) on top of
/// the XSD built-ins.
static BUILTIN_IRIS: Lazy<HashMap<&'static str, String>> = Lazy::new(|| {
    let xsd = |local: &str| format!("{}{}", XSD_NS, local);
    let mut map = HashMap::new();
    for name in [
        "anyAtomicType",
        "anyURI",
        "base64Binary",
        "boolean",
        "date",
        "dateTime",
        "dateTimeStamp",
        "dayTimeDuration",
        "decimal",
        "double",
        "duration",
        "float",
        "gDay",
        "gMonth",
        "gMonthDay",
        "gYear",
        "gYearMonth",
        "hexBinary",
        "int",
        "integer",
        "language",
        "long",
        "Name",
        "NCName",
        "NMTOKEN",
        "negativeInteger",
        "nonNegativeInteger",
        "nonPositiveInteger",
        "normalizedString",
        "positiveInteger",
        "QName",
        "short",
        "string",
        "time",
        "token",
        "byte",
        "unsignedByte",
        "unsignedInt",
        "unsignedLong",
        "unsignedShort",
        "yearMonthDuration",
    ] {
        map.insert(name, xsd(name));
    }
    map.insert("number", xsd("double"));
    map.insert("binary", xsd("base64Binary"));
    map.insert("datetime", xsd("dateTime"));
    map.insert("any", xsd("anyAtomicType"));
    map.insert("xml", format!("{}XMLLiteral", RDF_NS));
    map.insert("html", format!("{}HTML", RDF_NS));
    map.insert("json", format!("{}#JSON", CSVW_NS));
    map
});

/// Direct supertype edges of the built-in lattice.
static SUPERTYPE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("integer", "decimal"),
        ("long", "integer"),
        ("int", "long"),
        ("short", "int"),
        ("byte", "short"),
        ("nonNegativeInteger", "integer"),
        ("positiveInteger", "nonNegativeInteger"),
        ("unsignedLong", "nonNegativeInteger"),
        ("unsignedInt", "unsignedLong"),
        ("unsignedShort", "unsignedInt"),
        ("unsignedByte", "unsignedShort"),
        ("nonPositiveInteger", "integer"),
        ("negativeInteger", "nonPositiveInteger"),
        ("normalizedString", "string"),
        ("token", "normalizedString"),
        ("language", "token"),
        ("Name", "token"),
        ("NMTOKEN", "token"),
        ("NCName", "Name"),
        ("dateTimeStamp", "dateTime"),
        ("yearMonthDuration", "duration"),
        ("dayTimeDuration", "duration"),
        ("number", "double"),
        ("datetime", "dateTime"),
        ("binary", "base64Binary"),
    ])
});

/// XSD names CSVW explicitly refuses to process.
pub const UNSUPPORTED_XSD: [&str; 9] = [
    "anyType",
    "anySimpleType",
    "ENTITIES",
    "IDREFS",
    "NMTOKENS",
    "ENTITY",
    "ID",
    "IDREF",
    "NOTATION",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_IRIS.contains_key(name)
}

pub fn builtin_iri(name: &str) -> Option<&'static str> {
    BUILTIN_IRIS.get(name).map(String::as_str)
}

pub fn is_unsupported(name: &str) -> bool {
    UNSUPPORTED_XSD.contains(&name)
}

/// Walk the lattice upward; `is_subtype_of("short", "decimal")` holds.
pub fn is_subtype_of(name: &str, ancestor: &str) -> bool {
    let mut current = name;
    loop {
        if current == ancestor {
            return true;
        }
        match SUPERTYPE.get(current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

pub fn is_integer_family(name: &str) -> bool {
    is_subtype_of(name, "integer")
}

pub fn is_numeric(name: &str) -> bool {
    is_subtype_of(name, "decimal")
        || matches!(name, "double" | "float" | "number")
}

pub fn is_date_time_family(name: &str) -> bool {
    matches!(name, "date" | "time" | "datetime") || is_subtype_of(name, "dateTime")
}

pub fn is_duration_family(name: &str) -> bool {
    is_subtype_of(name, "duration")
}

pub fn is_boolean(name: &str) -> bool {
    name == "boolean"
}

/// String-family types retain the resolved language on their literals.
pub fn is_string_like(name: &str) -> bool {
    is_subtype_of(name, "string") || matches!(name, "xml" | "html" | "json")
}

/// Ordered types admit the minimum/maximum facet family.
pub fn is_ordered(name: &str) -> bool {
    is_numeric(name) || is_date_time_family(name) || is_duration_family(name)
}

/// Types exempt from CR/TAB replacement during cell pre-normalization.
pub fn retains_line_structure(name: &str) -> bool {
    matches!(
        name,
        "string" | "json" | "xml" | "html" | "anyAtomicType" | "any"
    )
}

/// Types exempt from whitespace collapsing (the line-structure set plus
/// `normalizedString`).
pub fn retains_whitespace(name: &str) -> bool {
    retains_line_structure(name) || name == "normalizedString"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        assert_eq!(
            builtin_iri("integer"),
            Some("http://www.w3.org/2001/XMLSchema#integer")
        );
        assert_eq!(
            builtin_iri("number"),
            Some("http://www.w3.org/2001/XMLSchema#double")
        );
        assert_eq!(builtin_iri("json"), Some("http://www.w3.org/ns/csvw#JSON"));
        assert_eq!(builtin_iri("bogus"), None);
    }

    #[test]
    fn lattice_walk() {
        assert!(is_subtype_of("unsignedByte", "integer"));
        assert!(is_subtype_of("short", "decimal"));
        assert!(is_subtype_of("language", "string"));
        assert!(is_subtype_of("dateTimeStamp", "dateTime"));
        assert!(!is_subtype_of("string", "decimal"));
        assert!(!is_subtype_of("decimal", "integer"));
    }

    #[test]
    fn family_predicates() {
        assert!(is_numeric("double"));
        assert!(is_numeric("nonPositiveInteger"));
        assert!(!is_numeric("date"));
        assert!(is_ordered("time"));
        assert!(is_ordered("yearMonthDuration"));
        assert!(!is_ordered("string"));
        assert!(is_string_like("normalizedString"));
        assert!(is_unsupported("IDREF"));
    }

    #[test]
    fn whitespace_classes() {
        assert!(retains_line_structure("json"));
        assert!(!retains_line_structure("normalizedString"));
        assert!(retains_whitespace("normalizedString"));
        assert!(!retains_whitespace("token"));
    }
}
