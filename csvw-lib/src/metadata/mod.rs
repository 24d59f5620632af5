//! The metadata object graph: TableGroup, Table, Schema, Column, Dialect,
//! Transformation and Datatype nodes with typed, validated properties.
//!
//! Nodes live in a single arena and reference each other by index, so
//! inheritance lookups walk parent indices instead of reference cycles.

mod merge;
mod normalize;
pub mod property;
mod validate;

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::debug;
use url::Url;

use crate::context::Context;
use crate::error::{CsvwError, Diagnostics};

pub use property::{AtomicKind, Category, NodeKind, PropertySpec};

const NAME_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum Slot {
    /// Canonical JSON form of a link, atomic, natural-language,
    /// column-reference or uri-template property. Object properties given as
    /// a bare URL string are also held here until a loader resolves them.
    Value(JsonValue),
    Node(NodeId),
    Nodes(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    slots: IndexMap<String, Slot>,
    /// JSON-LD common properties (keys containing `:`), normalized lazily.
    pub annotations: IndexMap<String, JsonValue>,
}

impl Node {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            slots: IndexMap::new(),
            annotations: IndexMap::new(),
        }
    }

    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots.get(key)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn value(&self, key: &str) -> Option<&JsonValue> {
        match self.slots.get(key) {
            Some(Slot::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn set_slot(&mut self, key: impl Into<String>, slot: Slot) {
        self.slots.insert(key.into(), slot);
    }

    pub fn remove_slot(&mut self, key: &str) -> Option<Slot> {
        self.slots.shift_remove(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub base: Option<Url>,
    pub default_language: Option<String>,
    pub type_hint: Option<NodeKind>,
}

#[derive(Debug, Clone)]
pub struct Metadata {
    nodes: Vec<Node>,
    root: NodeId,
    context: Context,
    diagnostics: Diagnostics,
}

impl Metadata {
    /// Parse a metadata JSON document into the node graph. Recoverable
    /// problems are downgraded to warnings on the diagnostics collector;
    /// only an unresolvable node type fails here.
    pub fn parse(json: &JsonValue, options: ParseOptions) -> Result<Metadata, CsvwError> {
        let obj = json
            .as_object()
            .ok_or_else(|| CsvwError::MetadataType(format!("expected object, found {}", json)))?;

        let mut diagnostics = Diagnostics::new();
        let context = parse_context(obj.get("@context"), &options, &mut diagnostics);

        let mut metadata = Metadata {
            nodes: Vec::new(),
            root: NodeId(0),
            context,
            diagnostics,
        };

        let root = metadata.build_node(obj, None, options.type_hint)?;
        metadata.root = root;

        // A bare Table document becomes a single-table group, so merging and
        // validation only ever see one top-level shape.
        if metadata.node(metadata.root).kind == NodeKind::Table {
            let group = metadata.alloc(Node::new(NodeKind::TableGroup, None));
            metadata.node_mut(metadata.root).parent = Some(group);
            let table = metadata.root;
            metadata
                .node_mut(group)
                .set_slot("tables", Slot::Nodes(vec![table]));
            metadata.root = group;
        }

        Ok(metadata)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    // ---- factory ----

    fn build_node(
        &mut self,
        obj: &JsonMap<String, JsonValue>,
        parent: Option<NodeId>,
        hint: Option<NodeKind>,
    ) -> Result<NodeId, CsvwError> {
        let kind = infer_kind(obj, hint)?;
        let id = self.alloc(Node::new(kind, parent));

        for (key, value) in obj {
            if key == "@context" {
                continue;
            }
            if key.contains(':') {
                self.node_mut(id).annotations.insert(key.clone(), value.clone());
                continue;
            }
            let spec = match property::spec_for(kind, key) {
                Some(spec) => *spec,
                None => {
                    self.diagnostics.add_warning(
                        format!("unknown property '{}' on {}", key, kind.type_name()),
                        Some("metadata_parsing".into()),
                    );
                    continue;
                }
            };
            self.set_property(id, &spec, value)?;
        }

        Ok(id)
    }

    fn set_property(
        &mut self,
        id: NodeId,
        spec: &PropertySpec,
        value: &JsonValue,
    ) -> Result<(), CsvwError> {
        let result = match spec.category {
            Category::Link => property::validate_link(value),
            Category::Atomic(atomic) => property::validate_atomic(atomic, value),
            Category::NaturalLanguage => property::validate_natural_language(value),
            Category::ColumnReference => property::validate_column_reference(value),
            Category::UriTemplate => property::validate_uri_template(value),
            Category::Array(child_kind) => {
                return self.set_array_property(id, spec, child_kind, value);
            }
            Category::Object(child_kind) => {
                return self.set_object_property(id, spec, child_kind, value);
            }
        };

        match result {
            Ok(stored) => {
                self.node_mut(id).set_slot(spec.name, Slot::Value(stored));
            }
            Err(message) => self.warn_invalid(id, spec, &message),
        }
        Ok(())
    }

    fn set_array_property(
        &mut self,
        id: NodeId,
        spec: &PropertySpec,
        child_kind: NodeKind,
        value: &JsonValue,
    ) -> Result<(), CsvwError> {
        let items = match value.as_array() {
            Some(items) => items,
            None => {
                self.warn_invalid(id, spec, &format!("expected array, found {}", value));
                return Ok(());
            }
        };
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            match item.as_object() {
                Some(obj) => {
                    children.push(self.build_node(obj, Some(id), Some(child_kind))?);
                }
                None => self.diagnostics.add_warning(
                    format!(
                        "ignoring non-object entry {} in '{}'",
                        item, spec.name
                    ),
                    Some("metadata_parsing".into()),
                ),
            }
        }
        self.node_mut(id).set_slot(spec.name, Slot::Nodes(children));
        Ok(())
    }

    fn set_object_property(
        &mut self,
        id: NodeId,
        spec: &PropertySpec,
        child_kind: NodeKind,
        value: &JsonValue,
    ) -> Result<(), CsvwError> {
        match value {
            JsonValue::Object(obj) => {
                let child = self.build_node(obj, Some(id), Some(child_kind))?;
                self.node_mut(id).set_slot(spec.name, Slot::Node(child));
            }
            JsonValue::String(s) if child_kind == NodeKind::Datatype => {
                // Datatype shorthand: "integer" lifts to {base: "integer"}.
                let lifted = json!({ "base": s });
                let child =
                    self.build_node(lifted.as_object().unwrap(), Some(id), Some(child_kind))?;
                self.node_mut(id).set_slot(spec.name, Slot::Node(child));
            }
            JsonValue::String(_) => {
                // A URL to a sub-document; a loader resolves it.
                self.node_mut(id)
                    .set_slot(spec.name, Slot::Value(value.clone()));
            }
            other => {
                self.warn_invalid(id, spec, &format!("expected object or URL, found {}", other));
            }
        }
        Ok(())
    }

    fn warn_invalid(&mut self, id: NodeId, spec: &PropertySpec, message: &str) {
        let kind = self.node(id).kind;
        self.diagnostics.add_warning(
            format!(
                "invalid value for '{}' on {}: {}",
                spec.name,
                kind.type_name(),
                message
            ),
            Some("metadata_parsing".into()),
        );
        // Revert to the documented default; drop the slot when none exists.
        match property::default_value(spec) {
            Some(default) => {
                self.node_mut(id).set_slot(spec.name, Slot::Value(default));
            }
            None => {
                self.node_mut(id).remove_slot(spec.name);
            }
        }
    }

    /// Resolve object properties that were given as bare URL strings
    /// (`"tableSchema": "schema.json"`) by loading the referenced
    /// sub-documents. Fetch or parse failures downgrade to warnings and the
    /// slot keeps its URL form.
    pub fn resolve_linked_objects(&mut self, loader: &dyn crate::loader::Loader) {
        let ids: Vec<NodeId> = self.node_ids().collect();
        for id in ids {
            let kind = self.node(id).kind;
            let pending: Vec<(String, NodeKind, String)> = self
                .node(id)
                .slots()
                .filter_map(|(key, slot)| match slot {
                    Slot::Value(JsonValue::String(link)) => {
                        property::spec_for(kind, key).and_then(|spec| match spec.category {
                            // Datatype strings are shorthand, lifted at parse.
                            Category::Object(child_kind) if child_kind != NodeKind::Datatype => {
                                Some((key.to_string(), child_kind, link.clone()))
                            }
                            _ => None,
                        })
                    }
                    _ => None,
                })
                .collect();

            for (key, child_kind, link) in pending {
                let resolved = self.context.resolve_link(&link);
                let url = match Url::parse(&resolved) {
                    Ok(url) => url,
                    Err(_) => {
                        self.diagnostics.add_warning(
                            format!("cannot resolve '{}' document at {}", key, resolved),
                            Some("metadata_loading".into()),
                        );
                        continue;
                    }
                };
                let loaded = loader
                    .fetch(&url)
                    .and_then(|doc| Ok(serde_json::from_slice::<JsonValue>(&doc.bytes)?));
                match loaded {
                    Ok(JsonValue::Object(obj)) => {
                        match self.build_node(&obj, Some(id), Some(child_kind)) {
                            Ok(child) => self.node_mut(id).set_slot(key, Slot::Node(child)),
                            Err(error) => self.diagnostics.add_warning(
                                format!("unusable '{}' document at {}: {}", key, url, error),
                                Some("metadata_loading".into()),
                            ),
                        }
                    }
                    Ok(other) => self.diagnostics.add_warning(
                        format!("'{}' document at {} is not an object: {}", key, url, other),
                        Some("metadata_loading".into()),
                    ),
                    Err(error) => self.diagnostics.add_warning(
                        format!("cannot load '{}' document at {}: {}", key, url, error),
                        Some("metadata_loading".into()),
                    ),
                }
            }
        }
    }

    // ---- inherited properties ----

    /// Nearest-ancestor lookup for an inherited property; falls back to the
    /// documented default when no ancestor carries a value.
    pub fn resolve(&self, node: NodeId, key: &str) -> Option<JsonValue> {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(slot) = self.node(id).slot(key) {
                return match slot {
                    Slot::Value(v) => Some(v.clone()),
                    Slot::Node(_) | Slot::Nodes(_) => Some(JsonValue::Null),
                };
            }
            current = self.node(id).parent;
        }
        property::INHERITED_PROPERTIES
            .iter()
            .find(|spec| spec.name == key)
            .and_then(property::default_value)
    }

    /// Nearest-ancestor lookup for an inherited node-valued property
    /// (`datatype`).
    pub fn resolve_node(&self, node: NodeId, key: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(Slot::Node(child)) = self.node(id).slot(key) {
                return Some(*child);
            }
            current = self.node(id).parent;
        }
        None
    }

    // ---- typed accessors ----

    pub fn tables(&self) -> Vec<NodeId> {
        match self.node(self.root).slot("tables") {
            Some(Slot::Nodes(tables)) => tables.clone(),
            _ => Vec::new(),
        }
    }

    pub fn first_table(&self) -> Option<NodeId> {
        self.tables().into_iter().next()
    }

    pub fn table_url(&self, table: NodeId) -> Option<String> {
        self.node(table)
            .value("url")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }

    pub fn schema_of(&self, table: NodeId) -> Option<NodeId> {
        match self.node(table).slot("tableSchema") {
            Some(Slot::Node(schema)) => Some(*schema),
            _ => match self.node(table).parent {
                Some(group) => match self.node(group).slot("tableSchema") {
                    Some(Slot::Node(schema)) => Some(*schema),
                    _ => None,
                },
                None => None,
            },
        }
    }

    pub fn columns_of(&self, schema: NodeId) -> Vec<NodeId> {
        match self.node(schema).slot("columns") {
            Some(Slot::Nodes(columns)) => columns.clone(),
            _ => Vec::new(),
        }
    }

    pub fn table_columns(&self, table: NodeId) -> Vec<NodeId> {
        self.schema_of(table)
            .map(|schema| self.columns_of(schema))
            .unwrap_or_default()
    }

    /// The table's own dialect, or the group's.
    pub fn dialect_of(&self, table: NodeId) -> Option<NodeId> {
        match self.node(table).slot("dialect") {
            Some(Slot::Node(dialect)) => Some(*dialect),
            _ => self.node(table).parent.and_then(|group| {
                match self.node(group).slot("dialect") {
                    Some(Slot::Node(dialect)) => Some(*dialect),
                    _ => None,
                }
            }),
        }
    }

    pub fn is_virtual(&self, column: NodeId) -> bool {
        self.node(column)
            .value("virtual")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }

    /// Indices (into the schema's column list) of the columns named by the
    /// schema's `primaryKey`. Unresolvable names are skipped; validation
    /// reports them separately.
    pub fn primary_key_indices(&self, table: NodeId) -> Vec<usize> {
        let schema = match self.schema_of(table) {
            Some(schema) => schema,
            None => return Vec::new(),
        };
        let refs = match self.node(schema).value("primaryKey") {
            Some(JsonValue::Array(refs)) => refs.clone(),
            _ => return Vec::new(),
        };
        let columns = self.columns_of(schema);
        refs.iter()
            .filter_map(JsonValue::as_str)
            .filter_map(|name| {
                columns
                    .iter()
                    .enumerate()
                    .find(|(number, column)| self.column_name(**column, number + 1) == name)
                    .map(|(index, _)| index)
            })
            .collect()
    }

    pub fn non_virtual_column_count(&self, table: NodeId) -> usize {
        self.table_columns(table)
            .iter()
            .filter(|c| !self.is_virtual(**c))
            .count()
    }

    /// A column's name: the `name` property, else the first `und` title
    /// percent-encoded, else `_col.<number>`.
    pub fn column_name(&self, column: NodeId, number: usize) -> String {
        if let Some(name) = self.node(column).value("name").and_then(JsonValue::as_str) {
            return name.to_string();
        }
        if let Some(titles) = self.node(column).value("titles") {
            if let Some(first) = titles
                .get("und")
                .and_then(JsonValue::as_array)
                .and_then(|list| list.first())
                .and_then(JsonValue::as_str)
            {
                return utf8_percent_encode(first, NAME_ENCODE).to_string();
            }
        }
        format!("_col.{}", number)
    }

    pub fn column_titles(&self, column: NodeId) -> Vec<(String, Vec<String>)> {
        match self.node(column).value("titles") {
            Some(JsonValue::Object(map)) => map
                .iter()
                .map(|(lang, values)| {
                    let values = values
                        .as_array()
                        .map(|list| {
                            list.iter()
                                .filter_map(JsonValue::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    (lang.clone(), values)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    // ---- serialization (full form, used by merge and to_atd) ----

    pub fn to_json(&self) -> JsonValue {
        let root = self.node_to_json(self.root);
        let mut map = JsonMap::new();
        map.insert("@context".to_string(), json!(crate::context::CSVW_NS));
        if let JsonValue::Object(inner) = root {
            map.extend(inner);
        }
        JsonValue::Object(map)
    }

    pub fn node_to_json(&self, id: NodeId) -> JsonValue {
        let node = self.node(id);
        let mut map = JsonMap::new();
        for (key, slot) in node.slots() {
            let value = match slot {
                Slot::Value(v) => v.clone(),
                Slot::Node(child) => self.node_to_json(*child),
                Slot::Nodes(children) => JsonValue::Array(
                    children.iter().map(|c| self.node_to_json(*c)).collect(),
                ),
            };
            map.insert(key.to_string(), value);
        }
        for (key, value) in &node.annotations {
            map.insert(key.clone(), value.clone());
        }
        JsonValue::Object(map)
    }
}

fn parse_context(
    context: Option<&JsonValue>,
    options: &ParseOptions,
    diagnostics: &mut Diagnostics,
) -> Context {
    let mut ctx = Context::new();
    if let Some(base) = &options.base {
        ctx = ctx.with_base(base.clone());
    }
    if let Some(language) = &options.default_language {
        ctx = ctx.with_language(language.clone());
    }

    let object = match context {
        None => return ctx,
        Some(JsonValue::String(_)) => None,
        Some(JsonValue::Array(items)) => items.iter().find_map(JsonValue::as_object),
        Some(JsonValue::Object(map)) => Some(map),
        Some(other) => {
            diagnostics.add_warning(
                format!("unusable @context: {}", other),
                Some("metadata_parsing".into()),
            );
            None
        }
    };

    if let Some(object) = object {
        if let Some(base) = object.get("@base").and_then(JsonValue::as_str) {
            let resolved = match ctx.base() {
                Some(current) => current.join(base).ok(),
                None => Url::parse(base).ok(),
            };
            match resolved {
                Some(url) => ctx = ctx.rebase(url),
                None => diagnostics.add_warning(
                    format!("cannot resolve @base '{}'", base),
                    Some("metadata_parsing".into()),
                ),
            }
        }
        if let Some(language) = object.get("@language").and_then(JsonValue::as_str) {
            if crate::context::is_valid_language_tag(language) {
                ctx = ctx.with_language(language);
            } else {
                diagnostics.add_warning(
                    format!("invalid @language '{}'", language),
                    Some("metadata_parsing".into()),
                );
            }
        }
    }
    ctx
}

/// Pick a node class from an explicit hint, `@type`, or the set of keys
/// present, in that order.
fn infer_kind(
    obj: &JsonMap<String, JsonValue>,
    hint: Option<NodeKind>,
) -> Result<NodeKind, CsvwError> {
    if let Some(kind) = hint {
        return Ok(kind);
    }
    if let Some(type_name) = obj.get("@type").and_then(JsonValue::as_str) {
        return NodeKind::from_type_name(type_name)
            .ok_or_else(|| CsvwError::MetadataType(format!("unknown @type '{}'", type_name)));
    }

    let has = |key: &str| obj.contains_key(key);
    let kind = if has("tables") {
        NodeKind::TableGroup
    } else if has("dialect") || has("tableSchema") || has("transformations") {
        NodeKind::Table
    } else if has("targetFormat") || has("scriptFormat") || has("source") {
        NodeKind::Transformation
    } else if has("columns") || has("primaryKey") || has("foreignKeys") {
        NodeKind::Schema
    } else if has("name") || has("virtual") || has("titles") {
        NodeKind::Column
    } else if has("commentPrefix")
        || has("delimiter")
        || has("doubleQuote")
        || has("encoding")
        || has("header")
        || has("headerRowCount")
        || has("lineTerminators")
        || has("quoteChar")
        || has("skipBlankRows")
        || has("skipColumns")
        || has("skipInitialSpace")
        || has("skipRows")
        || has("trim")
    {
        NodeKind::Dialect
    } else if has("url") {
        NodeKind::Table
    } else {
        debug!("cannot infer node type from keys: {:?}", obj.keys());
        return Err(CsvwError::MetadataType(format!(
            "cannot determine metadata type from properties: {}",
            obj.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    };
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: JsonValue) -> Metadata {
        Metadata::parse(&json, ParseOptions::default()).unwrap()
    }

    #[test]
    fn minimal_group_parses() {
        let m = parse(json!({
            "@context": "http://www.w3.org/ns/csvw",
            "tables": [{"url": "t.csv"}]
        }));
        assert_eq!(m.node(m.root()).kind, NodeKind::TableGroup);
        let tables = m.tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(m.table_url(tables[0]).as_deref(), Some("t.csv"));
    }

    #[test]
    fn bare_table_lifts_to_group() {
        let m = parse(json!({"url": "t.csv", "tableSchema": {"columns": []}}));
        assert_eq!(m.node(m.root()).kind, NodeKind::TableGroup);
        assert_eq!(m.tables().len(), 1);
    }

    #[test]
    fn kind_inference_order() {
        let obj = |v: JsonValue| v.as_object().unwrap().clone();
        assert_eq!(
            infer_kind(&obj(json!({"tables": [], "dialect": {}})), None).unwrap(),
            NodeKind::TableGroup
        );
        assert_eq!(
            infer_kind(&obj(json!({"targetFormat": "x", "url": "y"})), None).unwrap(),
            NodeKind::Transformation
        );
        assert_eq!(
            infer_kind(&obj(json!({"primaryKey": "id"})), None).unwrap(),
            NodeKind::Schema
        );
        assert_eq!(
            infer_kind(&obj(json!({"delimiter": ";"})), None).unwrap(),
            NodeKind::Dialect
        );
        assert!(infer_kind(&obj(json!({"bogus": 1})), None).is_err());
    }

    #[test]
    fn unknown_type_fails() {
        let err = Metadata::parse(
            &json!({"@type": "Wobble", "tables": []}),
            ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CsvwError::MetadataType(_)));
    }

    #[test]
    fn invalid_atomic_reverts_to_default() {
        let m = parse(json!({
            "tables": [{"url": "t.csv", "dialect": {"delimiter": "ab"}}]
        }));
        let table = m.tables()[0];
        let dialect = m.dialect_of(table).unwrap();
        assert_eq!(m.node(dialect).value("delimiter"), Some(&json!(",")));
        assert!(m.diagnostics().has_warnings());
    }

    #[test]
    fn invalid_value_without_default_is_dropped() {
        let m = parse(json!({
            "tables": [{"url": "t.csv", "tableSchema": {"columns": [
                {"name": "has space", "titles": "T"}
            ]}}]
        }));
        let col = m.table_columns(m.tables()[0])[0];
        assert!(m.node(col).value("name").is_none());
        assert!(m.diagnostics().has_warnings());
    }

    #[test]
    fn datatype_shorthand_lifts_to_object() {
        let m = parse(json!({
            "tables": [{"url": "t.csv", "tableSchema": {"columns": [
                {"name": "age", "datatype": "integer"}
            ]}}]
        }));
        let col = m.table_columns(m.tables()[0])[0];
        let dt = m.resolve_node(col, "datatype").unwrap();
        assert_eq!(m.node(dt).kind, NodeKind::Datatype);
        assert_eq!(m.node(dt).value("base"), Some(&json!("integer")));
    }

    #[test]
    fn inherited_resolution_walks_ancestors() {
        let m = parse(json!({
            "lang": "de",
            "null": "NA",
            "tables": [{"url": "t.csv", "tableSchema": {"columns": [
                {"name": "a", "lang": "fr"},
                {"name": "b"}
            ]}}]
        }));
        let cols = m.table_columns(m.tables()[0]);
        assert_eq!(m.resolve(cols[0], "lang"), Some(json!("fr")));
        assert_eq!(m.resolve(cols[1], "lang"), Some(json!("de")));
        assert_eq!(m.resolve(cols[1], "null"), Some(json!(["NA"])));
        // Unset on the whole chain: documented default.
        assert_eq!(m.resolve(cols[1], "textDirection"), Some(json!("ltr")));
        assert_eq!(m.resolve(cols[1], "separator"), None);
    }

    #[test]
    fn default_column_names() {
        let m = parse(json!({
            "tables": [{"url": "t.csv", "tableSchema": {"columns": [
                {"titles": "Given Name"},
                {}
            ]}}]
        }));
        let cols = m.table_columns(m.tables()[0]);
        assert_eq!(m.column_name(cols[0], 1), "Given%20Name");
        assert_eq!(m.column_name(cols[1], 2), "_col.2");
    }

    #[test]
    fn annotations_are_kept_apart() {
        let m = parse(json!({
            "tables": [{"url": "t.csv"}],
            "dc:title": "My group"
        }));
        assert_eq!(
            m.node(m.root()).annotations.get("dc:title"),
            Some(&json!("My group"))
        );
    }
}
