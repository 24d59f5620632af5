//! Numeric cell parsing: number formats with group/decimal characters,
//! picture patterns, percent and per-mille handling, and the bounded
//! integer widths.

use bigdecimal::{BigDecimal, ToPrimitive};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::str::FromStr;

use super::value::Value;

#[derive(Debug, Clone)]
pub struct NumberFormat {
    pub pattern: Option<String>,
    pub decimal_char: char,
    pub group_char: Option<char>,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            pattern: None,
            decimal_char: '.',
            group_char: None,
        }
    }
}

impl NumberFormat {
    /// Read a numeric `format`: either a bare pattern string or a map with
    /// `pattern`, `decimalChar` and `groupChar`.
    pub fn from_json(format: Option<&JsonValue>) -> NumberFormat {
        let mut result = NumberFormat::default();
        match format {
            Some(JsonValue::String(pattern)) => result.pattern = Some(pattern.clone()),
            Some(JsonValue::Object(map)) => {
                if let Some(pattern) = map.get("pattern").and_then(JsonValue::as_str) {
                    result.pattern = Some(pattern.to_string());
                }
                if let Some(c) = map
                    .get("decimalChar")
                    .and_then(JsonValue::as_str)
                    .and_then(|s| s.chars().next())
                {
                    result.decimal_char = c;
                }
                result.group_char = map
                    .get("groupChar")
                    .and_then(JsonValue::as_str)
                    .and_then(|s| s.chars().next());
            }
            _ => {}
        }
        result
    }

    /// Compile the picture pattern into a matching regex. `0` requires a
    /// digit, `#` allows one, and the symbolic `,`/`.` stand for the group
    /// and decimal characters.
    fn pattern_regex(&self) -> Option<Regex> {
        let pattern = self.pattern.as_deref()?;
        let mut regex = String::from("^");
        for c in pattern.chars() {
            match c {
                '0' => regex.push_str("[0-9]"),
                '#' => regex.push_str("[0-9]?"),
                ',' => {
                    if let Some(g) = self.group_char {
                        regex.push_str(&regex::escape(&g.to_string()));
                        regex.push('?');
                    } else {
                        regex.push_str(",?");
                    }
                }
                '.' => regex.push_str(&regex::escape(&self.decimal_char.to_string())),
                '+' | '-' => regex.push_str("[+-]"),
                'E' | 'e' => regex.push_str("[eE]"),
                '%' => regex.push('%'),
                '‰' => regex.push('‰'),
                other => regex.push_str(&regex::escape(&other.to_string())),
            }
        }
        regex.push('$');
        Regex::new(&regex).ok()
    }
}

/// Parse a raw string against a numeric datatype base.
pub fn parse_numeric(raw: &str, base: &str, format: &NumberFormat) -> Result<Value, String> {
    if let Some(regex) = format.pattern_regex() {
        if !regex.is_match(raw) {
            return Err(format!(
                "{} does not match the number pattern {}",
                raw,
                format.pattern.as_deref().unwrap_or_default()
            ));
        }
    }

    if let Some(group) = format.group_char {
        let doubled: String = [group, group].iter().collect();
        if raw.contains(&doubled) {
            return Err(format!("repeating {} in {}", group, raw));
        }
    }

    let mut cleaned: String = match format.group_char {
        Some(group) => raw.chars().filter(|c| *c != group).collect(),
        None => raw.to_string(),
    };
    if format.decimal_char != '.' {
        cleaned = cleaned.replace(format.decimal_char, ".");
    }

    // Percent and per-mille markers scale the value.
    let mut scale: i64 = 1;
    for (marker, factor) in [('%', 100), ('‰', 1000)] {
        if let Some(stripped) = cleaned.strip_suffix(marker) {
            cleaned = stripped.to_string();
            scale = factor;
        } else if let Some(stripped) = cleaned.strip_prefix(marker) {
            cleaned = stripped.to_string();
            scale = factor;
        }
    }
    let cleaned = cleaned.trim();

    match base {
        "double" | "float" | "number" => {
            let normalized = match cleaned {
                "INF" | "+INF" => "inf".to_string(),
                "-INF" => "-inf".to_string(),
                other => other.to_string(),
            };
            let parsed: f64 = normalized
                .parse()
                .map_err(|_| format!("{} is not a valid {}", raw, base))?;
            Ok(Value::Double(parsed / scale as f64))
        }
        "decimal" => {
            if cleaned.contains(['e', 'E']) {
                return Err(format!("{} is not a valid decimal", raw));
            }
            let parsed = BigDecimal::from_str(cleaned)
                .map_err(|_| format!("{} is not a valid decimal", raw))?;
            Ok(Value::Decimal(parsed / BigDecimal::from(scale)))
        }
        _ => {
            let parsed = if scale == 1 {
                cleaned
                    .parse::<i64>()
                    .map_err(|_| format!("{} is not a valid {}", raw, base))?
            } else {
                let scaled = BigDecimal::from_str(cleaned)
                    .map_err(|_| format!("{} is not a valid {}", raw, base))?
                    / BigDecimal::from(scale);
                if !scaled.is_integer() {
                    return Err(format!("{} is not a valid {}", raw, base));
                }
                scaled
                    .to_i64()
                    .ok_or_else(|| format!("{} is not a valid {}", raw, base))?
            };
            check_integer_width(parsed, base)
                .map_err(|_| format!("{} is not a valid {}", raw, base))?;
            Ok(Value::Integer(parsed))
        }
    }
}

/// Enforce the bit-width and sign constraints of the integer family.
fn check_integer_width(value: i64, base: &str) -> Result<(), ()> {
    let ok = match base {
        "integer" | "long" => true,
        "int" => i32::try_from(value).is_ok(),
        "short" => i16::try_from(value).is_ok(),
        "byte" => i8::try_from(value).is_ok(),
        "unsignedLong" => value >= 0,
        "unsignedInt" => value >= 0 && value <= u32::MAX as i64,
        "unsignedShort" => value >= 0 && value <= u16::MAX as i64,
        "unsignedByte" => value >= 0 && value <= u8::MAX as i64,
        "nonNegativeInteger" => value >= 0,
        "positiveInteger" => value >= 1,
        "nonPositiveInteger" => value <= 0,
        "negativeInteger" => value <= -1,
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(())
    }
}
