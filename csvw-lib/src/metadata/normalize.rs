//! Normalization: canonicalize every slot to its storage form. Most atomic
//! coercions happen when properties are set; this pass absolutizes links and
//! normalizes JSON-LD common properties and notes.

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use super::{Metadata, NodeId, Slot};
use crate::context::{is_valid_language_tag, Context};
use crate::error::Diagnostics;
use crate::metadata::property::{self, Category};

impl Metadata {
    /// Canonicalize the graph in place. Normalization is idempotent.
    pub fn normalize(mut self) -> Self {
        let ids: Vec<NodeId> = self.node_ids().collect();
        for id in ids {
            self.normalize_links(id);
            self.normalize_annotations(id);
            self.normalize_notes(id);
        }
        self
    }

    fn normalize_links(&mut self, id: NodeId) {
        let kind = self.node(id).kind;
        let link_keys: Vec<String> = self
            .node(id)
            .slots()
            .filter_map(|(key, slot)| match slot {
                Slot::Value(JsonValue::String(_)) => property::spec_for(kind, key)
                    .filter(|spec| spec.category == Category::Link)
                    .map(|_| key.to_string()),
                _ => None,
            })
            .collect();

        for key in link_keys {
            let resolved = match self.node(id).value(&key).and_then(JsonValue::as_str) {
                Some(link) => self.context().resolve_link(link),
                None => continue,
            };
            self.node_mut(id).set_slot(key, Slot::Value(json!(resolved)));
        }
    }

    fn normalize_annotations(&mut self, id: NodeId) {
        if self.node(id).annotations.is_empty() {
            return;
        }
        let context = self.context().clone();
        let mut diagnostics = Diagnostics::new();
        let annotations = self.node(id).annotations.clone();
        let normalized = annotations
            .into_iter()
            .map(|(key, value)| {
                (
                    key,
                    normalize_jsonld_value(&value, &context, &mut diagnostics),
                )
            })
            .collect();
        self.node_mut(id).annotations = normalized;
        self.diagnostics.merge(diagnostics);
    }

    fn normalize_notes(&mut self, id: NodeId) {
        let notes = match self.node(id).value("notes") {
            Some(JsonValue::Array(items)) => items.clone(),
            _ => return,
        };
        let context = self.context().clone();
        let mut diagnostics = Diagnostics::new();
        let normalized: Vec<JsonValue> = notes
            .iter()
            .map(|note| normalize_jsonld_value(note, &context, &mut diagnostics))
            .collect();
        self.node_mut(id)
            .set_slot("notes", Slot::Value(JsonValue::Array(normalized)));
        self.diagnostics.merge(diagnostics);
    }
}

/// Normalize a JSON-LD value: wrap scalars in value objects, expand `@id`
/// and `@type`, recurse into node objects, and reject value objects that mix
/// `@type` with `@language` or carry invalid language tags.
pub fn normalize_jsonld_value(
    value: &JsonValue,
    context: &Context,
    diagnostics: &mut Diagnostics,
) -> JsonValue {
    match value {
        JsonValue::String(s) => match context.language() {
            Some(language) => json!({ "@value": s, "@language": language }),
            None => json!({ "@value": s }),
        },
        JsonValue::Bool(_) | JsonValue::Number(_) => json!({ "@value": value }),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| normalize_jsonld_value(item, context, diagnostics))
                .collect(),
        ),
        JsonValue::Object(map) if map.contains_key("@value") => {
            normalize_value_object(map, diagnostics)
        }
        JsonValue::Object(map) => {
            let mut out = JsonMap::new();
            for (key, v) in map {
                match key.as_str() {
                    "@id" => {
                        let expanded = v
                            .as_str()
                            .map(|id| context.resolve_link(id))
                            .map(JsonValue::from)
                            .unwrap_or_else(|| v.clone());
                        out.insert(key.clone(), expanded);
                    }
                    "@type" => {
                        let expanded = match v {
                            JsonValue::String(t) => json!(context.expand_iri(t)),
                            JsonValue::Array(types) => JsonValue::Array(
                                types
                                    .iter()
                                    .map(|t| match t.as_str() {
                                        Some(t) => json!(context.expand_iri(t)),
                                        None => t.clone(),
                                    })
                                    .collect(),
                            ),
                            other => other.clone(),
                        };
                        out.insert(key.clone(), expanded);
                    }
                    _ => {
                        out.insert(
                            key.clone(),
                            normalize_jsonld_value(v, context, diagnostics),
                        );
                    }
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Null => JsonValue::Null,
    }
}

fn normalize_value_object(
    map: &JsonMap<String, JsonValue>,
    diagnostics: &mut Diagnostics,
) -> JsonValue {
    let mut out = map.clone();
    if out.contains_key("@type") && out.contains_key("@language") {
        diagnostics.add_warning(
            "value object mixes @type and @language; dropping @language",
            Some("jsonld_normalization".into()),
        );
        out.remove("@language");
    }
    if let Some(language) = out.get("@language").and_then(JsonValue::as_str) {
        if !is_valid_language_tag(language) {
            diagnostics.add_warning(
                format!("invalid @language '{}' on value object", language),
                Some("jsonld_normalization".into()),
            );
            out.remove("@language");
        }
    }
    JsonValue::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParseOptions;
    use url::Url;

    fn options() -> ParseOptions {
        ParseOptions {
            base: Some(Url::parse("http://example.org/meta.json").unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn links_become_absolute() {
        let m = Metadata::parse(
            &json!({"tables": [{"url": "t.csv"}]}),
            options(),
        )
        .unwrap()
        .normalize();
        let table = m.tables()[0];
        assert_eq!(
            m.table_url(table).as_deref(),
            Some("http://example.org/t.csv")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let m = Metadata::parse(
            &json!({
                "tables": [{"url": "t.csv", "notes": ["hello"], "dc:title": "T"}],
                "rdfs:comment": {"@id": "frag", "@type": "Table"}
            }),
            options(),
        )
        .unwrap();
        let once = m.normalize();
        let first = once.to_json();
        let twice = once.normalize();
        assert_eq!(first, twice.to_json());
    }

    #[test]
    fn strings_wrap_with_language() {
        let mut diags = Diagnostics::new();
        let ctx = Context::new().with_language("en");
        assert_eq!(
            normalize_jsonld_value(&json!("hi"), &ctx, &mut diags),
            json!({"@value": "hi", "@language": "en"})
        );
        assert_eq!(
            normalize_jsonld_value(&json!(5), &ctx, &mut diags),
            json!({"@value": 5})
        );
    }

    #[test]
    fn value_object_conflicts_are_rejected() {
        let mut diags = Diagnostics::new();
        let ctx = Context::new();
        let normalized = normalize_jsonld_value(
            &json!({"@value": "x", "@type": "xsd:string", "@language": "en"}),
            &ctx,
            &mut diags,
        );
        assert_eq!(
            normalized,
            json!({"@value": "x", "@type": "xsd:string"})
        );
        assert!(diags.has_warnings());

        let normalized = normalize_jsonld_value(
            &json!({"@value": "x", "@language": "not a tag"}),
            &ctx,
            &mut diags,
        );
        assert_eq!(normalized, json!({"@value": "x"}));
    }

    #[test]
    fn node_objects_expand_id_and_type() {
        let mut diags = Diagnostics::new();
        let ctx = Context::new().with_base(Url::parse("http://example.org/doc").unwrap());
        let normalized = normalize_jsonld_value(
            &json!({"@id": "thing", "@type": "Table"}),
            &ctx,
            &mut diags,
        );
        assert_eq!(
            normalized,
            json!({
                "@id": "http://example.org/thing",
                "@type": "http://www.w3.org/ns/csvw#Table"
            })
        );
    }
}
