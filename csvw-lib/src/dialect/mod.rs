//! Dialect handling: resolve the Dialect node into concrete CSV parsing
//! options, configure the reader, and extract embedded metadata from header
//! rows.

use std::io::Read;

use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::context::CSVW_NS;
use crate::error::Diagnostics;
use crate::metadata::{Metadata, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    True,
    False,
    Start,
    End,
}

impl TrimMode {
    pub fn apply<'a>(&self, value: &'a str) -> &'a str {
        match self {
            TrimMode::True => value.trim(),
            TrimMode::False => value,
            TrimMode::Start => value.trim_start(),
            TrimMode::End => value.trim_end(),
        }
    }
}

/// Fully resolved dialect options, with every default applied.
#[derive(Debug, Clone)]
pub struct DialectOptions {
    pub comment_prefix: Option<char>,
    pub delimiter: char,
    pub double_quote: bool,
    pub encoding: String,
    pub header: bool,
    pub header_row_count: u32,
    pub line_terminators: Vec<String>,
    pub quote_char: Option<char>,
    pub skip_blank_rows: bool,
    pub skip_columns: u32,
    pub skip_initial_space: bool,
    pub skip_rows: u32,
    pub trim: TrimMode,
}

impl Default for DialectOptions {
    fn default() -> Self {
        Self {
            comment_prefix: Some('#'),
            delimiter: ',',
            double_quote: true,
            encoding: "utf-8".to_string(),
            header: true,
            header_row_count: 1,
            line_terminators: vec!["\r\n".to_string(), "\n".to_string()],
            quote_char: Some('"'),
            skip_blank_rows: false,
            skip_columns: 0,
            skip_initial_space: false,
            skip_rows: 0,
            trim: TrimMode::True,
        }
    }
}

impl DialectOptions {
    /// Resolve a table's dialect (own or inherited from the group) into
    /// concrete options. Problems downgrade to warnings with the default
    /// substituted.
    pub fn for_table(
        metadata: &Metadata,
        table: NodeId,
        diagnostics: &mut Diagnostics,
    ) -> DialectOptions {
        let mut options = DialectOptions::default();
        let dialect = match metadata.dialect_of(table) {
            Some(dialect) => dialect,
            None => return options,
        };
        let node = metadata.node(dialect);

        let single_char = |key: &str, slot: &mut Option<char>, diags: &mut Diagnostics| {
            match node.value(key) {
                Some(JsonValue::String(s)) => match s.chars().next() {
                    Some(c) if s.chars().count() == 1 => *slot = Some(c),
                    _ => diags.add_warning(
                        format!("{} must be a single character, found \"{}\"", key, s),
                        Some("dialect".into()),
                    ),
                },
                Some(JsonValue::Null) => *slot = None,
                Some(other) => diags.add_warning(
                    format!("{} must be a single character, found {}", key, other),
                    Some("dialect".into()),
                ),
                None => {}
            }
        };

        single_char("commentPrefix", &mut options.comment_prefix, diagnostics);
        single_char("quoteChar", &mut options.quote_char, diagnostics);
        let mut delimiter = Some(options.delimiter);
        single_char("delimiter", &mut delimiter, diagnostics);
        options.delimiter = delimiter.unwrap_or(',');

        if let Some(b) = node.value("doubleQuote").and_then(JsonValue::as_bool) {
            options.double_quote = b;
        }
        if let Some(s) = node.value("encoding").and_then(JsonValue::as_str) {
            options.encoding = s.to_lowercase();
            if options.encoding != "utf-8" && options.encoding != "utf8" {
                diagnostics.add_warning(
                    format!("encoding {} is read as utf-8", options.encoding),
                    Some("dialect".into()),
                );
            }
        }
        if let Some(b) = node.value("header").and_then(JsonValue::as_bool) {
            options.header = b;
        }
        options.header_row_count = node
            .value("headerRowCount")
            .and_then(JsonValue::as_u64)
            .map(|n| n as u32)
            .unwrap_or(if options.header { 1 } else { 0 });
        if let Some(terminators) = node.value("lineTerminators").and_then(JsonValue::as_array) {
            options.line_terminators = terminators
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(b) = node.value("skipBlankRows").and_then(JsonValue::as_bool) {
            options.skip_blank_rows = b;
        }
        if let Some(n) = node.value("skipColumns").and_then(JsonValue::as_u64) {
            options.skip_columns = n as u32;
        }
        if let Some(b) = node.value("skipInitialSpace").and_then(JsonValue::as_bool) {
            options.skip_initial_space = b;
        }
        if let Some(n) = node.value("skipRows").and_then(JsonValue::as_u64) {
            options.skip_rows = n as u32;
        }
        options.trim = match node.value("trim").and_then(JsonValue::as_str) {
            Some("true") => TrimMode::True,
            Some("false") => TrimMode::False,
            Some("start") => TrimMode::Start,
            Some("end") => TrimMode::End,
            Some(other) => {
                diagnostics.add_warning(
                    format!("unknown trim mode \"{}\"", other),
                    Some("dialect".into()),
                );
                TrimMode::True
            }
            None if options.skip_initial_space => TrimMode::Start,
            None => TrimMode::True,
        };

        debug!("resolved dialect: {:?}", options);
        options
    }

    /// Configure a CSV reader for these options. Rows are read as raw
    /// records; header handling happens a layer up.
    pub fn reader_for<R: Read>(&self, input: R) -> csv::Reader<R> {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter as u8)
            .double_quote(self.double_quote);
        match self.quote_char {
            Some(c) => {
                builder.quote(c as u8);
            }
            None => {
                builder.quoting(false);
            }
        }
        // The csv crate recognizes one terminator; CRLF also accepts bare CR
        // and LF, which covers the default terminator set.
        if let Some(t) = self.line_terminators.first() {
            if t != "\r\n" && t != "\n" && t != "\r" {
                if let Some(&byte) = t.as_bytes().first() {
                    builder.terminator(csv::Terminator::Any(byte));
                }
            }
        }
        builder.from_reader(input)
    }

    /// Does a raw record begin with the comment prefix?
    pub fn comment_of(&self, record: &csv::StringRecord) -> Option<String> {
        let prefix = self.comment_prefix?;
        let joined = record.iter().collect::<Vec<_>>().join(&self.delimiter.to_string());
        let trimmed = self.trim.apply(&joined);
        trimmed
            .strip_prefix(prefix)
            .map(|rest| rest.trim().to_string())
    }
}

/// Read the header region of a CSV stream and produce embedded Table
/// metadata: column titles harvested from header rows, comments collected
/// from skipped rows. Never fails on malformed header shapes.
pub fn embedded_metadata<R: Read>(
    input: R,
    url: &str,
    options: &DialectOptions,
    language: Option<&str>,
) -> Result<JsonValue, crate::error::CsvwError> {
    let mut reader = options.reader_for(input);
    let mut comments: Vec<String> = Vec::new();
    let mut titles: Vec<Vec<String>> = Vec::new();

    let mut records = reader.records();
    for _ in 0..options.skip_rows {
        match records.next() {
            Some(record) => {
                let record = record?;
                if let Some(comment) = options.comment_of(&record) {
                    comments.push(comment);
                }
            }
            None => break,
        }
    }

    let mut header_rows_seen = 0;
    while header_rows_seen < options.header_row_count {
        let record = match records.next() {
            Some(record) => record?,
            None => break,
        };
        // Comment rows do not count against headerRowCount.
        if let Some(comment) = options.comment_of(&record) {
            comments.push(comment);
            continue;
        }
        header_rows_seen += 1;
        for (index, field) in record.iter().enumerate() {
            let index = match index.checked_sub(options.skip_columns as usize) {
                Some(index) => index,
                None => continue,
            };
            while titles.len() <= index {
                titles.push(Vec::new());
            }
            let trimmed = options.trim.apply(field);
            if !trimmed.is_empty() {
                titles[index].push(trimmed.to_string());
            }
        }
    }

    let columns: Vec<JsonValue> = titles
        .iter()
        .map(|column_titles| {
            if column_titles.is_empty() {
                json!({})
            } else {
                json!({ "titles": { "und": column_titles } })
            }
        })
        .collect();

    let mut table = serde_json::Map::new();
    table.insert("@context".to_string(), json!(CSVW_NS));
    table.insert("url".to_string(), json!(url));
    table.insert("@type".to_string(), json!("Table"));
    table.insert(
        "tableSchema".to_string(),
        json!({ "columns": columns }),
    );
    if let Some(language) = language {
        table.insert("lang".to_string(), json!(language));
    }
    if !comments.is_empty() {
        table.insert("rdfs:comment".to_string(), json!(comments));
    }
    Ok(JsonValue::Object(table))
}
