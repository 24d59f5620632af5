//! Typed cell values and facet checking.

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Value as JsonValue};
use std::str::FromStr;

use crate::metadata::{Metadata, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String {
        value: String,
        lang: Option<String>,
    },
    Boolean(bool),
    Integer(i64),
    Decimal(BigDecimal),
    Double(f64),
    Date {
        value: NaiveDate,
        lexical: String,
    },
    Time {
        value: NaiveTime,
        lexical: String,
    },
    DateTime {
        value: NaiveDateTime,
        lexical: String,
    },
    Duration(String),
    Typed {
        value: String,
        datatype: String,
    },
    List(Vec<Option<Value>>),
}

impl Value {
    /// The lexical form used for URI-template variables and annotated output.
    pub fn lexical(&self) -> String {
        match self {
            Value::String { value, .. } => value.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Decimal(d) => d.clone().normalized().to_string(),
            Value::Double(f) => {
                if f.is_infinite() {
                    if *f > 0.0 { "INF".to_string() } else { "-INF".to_string() }
                } else {
                    f.to_string()
                }
            }
            Value::Date { lexical, .. }
            | Value::Time { lexical, .. }
            | Value::DateTime { lexical, .. } => lexical.clone(),
            Value::Duration(lexical) => lexical.clone(),
            Value::Typed { value, .. } => value.clone(),
            Value::List(items) => items
                .iter()
                .map(|item| item.as_ref().map(Value::lexical).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::String { value, .. } => json!(value),
            Value::Boolean(b) => json!(b),
            Value::Integer(n) => json!(n),
            Value::Decimal(d) => match d.to_f64() {
                Some(f) => serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .unwrap_or_else(|| json!(d.to_string())),
                None => json!(d.to_string()),
            },
            Value::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| json!(self.lexical())),
            Value::Date { lexical, .. }
            | Value::Time { lexical, .. }
            | Value::DateTime { lexical, .. } => json!(lexical),
            Value::Duration(lexical) => json!(lexical),
            Value::Typed { value, .. } => json!(value),
            Value::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Some(value) => value.to_json(),
                        None => JsonValue::Null,
                    })
                    .collect(),
            ),
        }
    }

    fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Integer(n) => Some(BigDecimal::from(*n)),
            Value::Decimal(d) => Some(d.clone()),
            Value::Double(f) => BigDecimal::from_f64(*f),
            _ => None,
        }
    }
}

/// Length and bound facets extracted from a Datatype node.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub length: Option<u64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_inclusive: Option<JsonValue>,
    pub max_inclusive: Option<JsonValue>,
    pub min_exclusive: Option<JsonValue>,
    pub max_exclusive: Option<JsonValue>,
}

impl Facets {
    pub fn from_datatype(metadata: &Metadata, datatype: NodeId) -> Facets {
        let node = metadata.node(datatype);
        let int = |key: &str| node.value(key).and_then(JsonValue::as_u64);
        let bound = |key: &str, alias: &str| {
            node.value(key).cloned().or_else(|| node.value(alias).cloned())
        };
        Facets {
            length: int("length"),
            min_length: int("minLength"),
            max_length: int("maxLength"),
            min_inclusive: bound("minInclusive", "minimum"),
            max_inclusive: bound("maxInclusive", "maximum"),
            min_exclusive: node.value("minExclusive").cloned(),
            max_exclusive: node.value("maxExclusive").cloned(),
        }
    }

    /// Length facets count Unicode characters of the pre-parse string.
    pub fn check_length(&self, raw: &str, errors: &mut Vec<String>) {
        let count = raw.chars().count() as u64;
        if let Some(length) = self.length {
            if count != length {
                errors.push(format!("value has length {}, expected {}", count, length));
            }
        }
        if let Some(min) = self.min_length {
            if count < min {
                errors.push(format!("value has length {}, minimum is {}", count, min));
            }
        }
        if let Some(max) = self.max_length {
            if count > max {
                errors.push(format!("value has length {}, maximum is {}", count, max));
            }
        }
    }

    /// Bound facets compare the parsed value. Numeric bounds compare as
    /// decimals; temporal bounds parse with the same lexical rules as the
    /// value. Durations are not compared.
    pub fn check_bounds(&self, value: &Value, errors: &mut Vec<String>) {
        let checks: [(&Option<JsonValue>, &str); 4] = [
            (&self.min_inclusive, "minInclusive"),
            (&self.max_inclusive, "maxInclusive"),
            (&self.min_exclusive, "minExclusive"),
            (&self.max_exclusive, "maxExclusive"),
        ];
        for (bound, facet) in checks {
            let bound = match bound {
                Some(bound) => bound,
                None => continue,
            };
            let ok = match compare_to_bound(value, bound) {
                Some(ordering) => match facet {
                    "minInclusive" => ordering != std::cmp::Ordering::Less,
                    "maxInclusive" => ordering != std::cmp::Ordering::Greater,
                    "minExclusive" => ordering == std::cmp::Ordering::Greater,
                    "maxExclusive" => ordering == std::cmp::Ordering::Less,
                    _ => true,
                },
                None => continue,
            };
            if !ok {
                errors.push(format!(
                    "value {} violates {} {}",
                    value.lexical(),
                    facet,
                    bound
                ));
            }
        }
    }
}

fn compare_to_bound(value: &Value, bound: &JsonValue) -> Option<std::cmp::Ordering> {
    if let Some(decimal) = value.as_decimal() {
        let bound = match bound {
            JsonValue::Number(n) => BigDecimal::from_str(&n.to_string()).ok()?,
            JsonValue::String(s) => BigDecimal::from_str(s).ok()?,
            _ => return None,
        };
        return decimal.partial_cmp(&bound);
    }
    let bound = bound.as_str()?;
    match value {
        Value::Date { value, .. } => {
            let parsed = NaiveDate::parse_from_str(bound, "%Y-%m-%d").ok()?;
            value.partial_cmp(&parsed)
        }
        Value::Time { value, .. } => {
            let parsed = NaiveTime::parse_from_str(bound, "%H:%M:%S").ok()?;
            value.partial_cmp(&parsed)
        }
        Value::DateTime { value, .. } => {
            let parsed = NaiveDateTime::parse_from_str(bound, "%Y-%m-%dT%H:%M:%S").ok()?;
            value.partial_cmp(&parsed)
        }
        _ => None,
    }
}
