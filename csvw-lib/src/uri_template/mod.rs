//! RFC 6570 Level 2 URI templates, used by `aboutUrl`, `propertyUrl` and
//! `valueUrl`. Templates are validated structurally when metadata is parsed
//! and expanded once per cell.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

// Unreserved characters stay literal in simple expansion.
const SIMPLE_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// Reserved expansion (`+` and `#` operators) additionally passes through
// reserved characters and percent triplets.
const RESERVED_ENCODE: &AsciiSet = &SIMPLE_ENCODE
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'%');

static VARNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z0-9_]|%[0-9A-Fa-f]{2})(?:[A-Za-z0-9_.]|%[0-9A-Fa-f]{2})*$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Simple,
    Reserved,
    Fragment,
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Expression { op: Operator, vars: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct UriTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl UriTemplate {
    /// Parse and structurally validate a template string.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    let mut expr = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        if c == '{' {
                            return Err(format!("nested '{{' in URI template: {}", raw));
                        }
                        expr.push(c);
                    }
                    if !closed {
                        return Err(format!("unterminated expression in URI template: {}", raw));
                    }
                    parts.push(parse_expression(&expr, raw)?);
                }
                '}' => return Err(format!("unmatched '}}' in URI template: {}", raw)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable names referenced by this template, percent-decoded form not
    /// applied; callers key the value map by the raw name.
    pub fn variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Expression { vars, .. } => Some(vars.iter().map(String::as_str)),
                Part::Literal(_) => None,
            })
            .flatten()
            .collect()
    }

    /// Expand against a variable map. Unset variables expand to nothing, as
    /// RFC 6570 prescribes.
    pub fn expand(&self, values: &HashMap<String, String>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Expression { op, vars } => {
                    let expanded: Vec<String> = vars
                        .iter()
                        .filter_map(|name| values.get(name))
                        .map(|value| match op {
                            Operator::Simple => {
                                utf8_percent_encode(value, SIMPLE_ENCODE).to_string()
                            }
                            Operator::Reserved | Operator::Fragment => {
                                utf8_percent_encode(value, RESERVED_ENCODE).to_string()
                            }
                        })
                        .collect();
                    if expanded.is_empty() {
                        continue;
                    }
                    if *op == Operator::Fragment {
                        out.push('#');
                    }
                    out.push_str(&expanded.join(","));
                }
            }
        }
        out
    }
}

fn parse_expression(expr: &str, raw: &str) -> Result<Part, String> {
    let (op, rest) = match expr.chars().next() {
        Some('+') => (Operator::Reserved, &expr[1..]),
        Some('#') => (Operator::Fragment, &expr[1..]),
        Some(_) => (Operator::Simple, expr),
        None => return Err(format!("empty expression in URI template: {}", raw)),
    };

    let mut vars = Vec::new();
    for name in rest.split(',') {
        if !VARNAME_RE.is_match(name) {
            return Err(format!(
                "invalid variable name '{}' in URI template: {}",
                name, raw
            ));
        }
        vars.push(name.to_string());
    }
    Ok(Part::Expression { op, vars })
}
