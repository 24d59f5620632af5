//! Value context: base URL, default language and prefix handling for the
//! JSON-LD style `@context` carried by CSVW metadata documents.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// The CSVW namespace. A metadata document's `@context` collapses to this
/// string during normalization.
pub const CSVW_NS: &str = "http://www.w3.org/ns/csvw";

pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";

/// Prefixes from the CSVW initial context that metadata documents may use
/// without declaring them.
static INITIAL_PREFIXES: Lazy<IndexMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = IndexMap::new();
    map.insert("csvw", "http://www.w3.org/ns/csvw#");
    map.insert("rdf", RDF_NS);
    map.insert("rdfs", RDFS_NS);
    map.insert("xsd", XSD_NS);
    map.insert("dc", "http://purl.org/dc/terms/");
    map.insert("dcat", "http://www.w3.org/ns/dcat#");
    map.insert("foaf", "http://xmlns.com/foaf/0.1/");
    map.insert("schema", "http://schema.org/");
    map.insert("skos", "http://www.w3.org/2004/02/skos/core#");
    map.insert("prov", "http://www.w3.org/ns/prov#");
    map
});

// Simplified BCP47 production: language, then optional subtags. Enough to
// reject garbage like "1" or "x y" while accepting "en", "en-US", "zh-Hant".
static LANGUAGE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{2,8}(-[a-zA-Z0-9]{1,8})*$").expect("valid regex"));

pub fn is_valid_language_tag(tag: &str) -> bool {
    tag == "und" || LANGUAGE_TAG_RE.is_match(tag)
}

/// Immutable after parsing, except `base` may be rebased per table.
#[derive(Debug, Clone, Default)]
pub struct Context {
    base: Option<Url>,
    language: Option<String>,
    prefixes: IndexMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Replace the base URL, e.g. when a table's own URL becomes the base for
    /// its rows.
    pub fn rebase(&self, base: Url) -> Context {
        Context {
            base: Some(base),
            language: self.language.clone(),
            prefixes: self.prefixes.clone(),
        }
    }

    pub fn declare_prefix(&mut self, prefix: impl Into<String>, expansion: impl Into<String>) {
        self.prefixes.insert(prefix.into(), expansion.into());
    }

    fn prefix_expansion(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .get(prefix)
            .map(String::as_str)
            .or_else(|| INITIAL_PREFIXES.get(prefix).copied())
    }

    /// Resolve a link property value against the base URL. Absolute URLs and
    /// blank-node identifiers pass through unchanged.
    pub fn resolve_link(&self, link: &str) -> String {
        if link.starts_with("_:") || Url::parse(link).is_ok() {
            return link.to_string();
        }
        match &self.base {
            Some(base) => match base.join(link) {
                Ok(resolved) => resolved.to_string(),
                Err(_) => link.to_string(),
            },
            None => link.to_string(),
        }
    }

    /// Expand a term or compact IRI to an absolute IRI. Bare terms expand
    /// into the CSVW vocabulary; `prefix:suffix` uses declared or initial
    /// prefixes; absolute IRIs pass through.
    pub fn expand_iri(&self, value: &str) -> String {
        if let Some((prefix, suffix)) = value.split_once(':') {
            if let Some(expansion) = self.prefix_expansion(prefix) {
                return format!("{}{}", expansion, suffix);
            }
            // "http://..." and friends land here: the "prefix" is a scheme.
            if Url::parse(value).is_ok() {
                return value.to_string();
            }
        }
        format!("{}#{}", CSVW_NS, value)
    }

    /// Compact an absolute IRI back to `prefix:suffix` form where an initial
    /// or declared prefix matches.
    pub fn compact_iri(&self, iri: &str) -> String {
        for (prefix, expansion) in self
            .prefixes
            .iter()
            .map(|(p, e)| (p.as_str(), e.as_str()))
            .chain(INITIAL_PREFIXES.iter().map(|(p, e)| (*p, *e)))
        {
            if let Some(suffix) = iri.strip_prefix(expansion) {
                if !suffix.is_empty() {
                    return format!("{}:{}", prefix, suffix);
                }
            }
        }
        iri.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tags() {
        assert!(is_valid_language_tag("en"));
        assert!(is_valid_language_tag("en-US"));
        assert!(is_valid_language_tag("zh-Hant"));
        assert!(is_valid_language_tag("und"));
        assert!(!is_valid_language_tag("1"));
        assert!(!is_valid_language_tag("en US"));
        assert!(!is_valid_language_tag(""));
    }

    #[test]
    fn link_resolution_against_base() {
        let ctx = Context::new().with_base(Url::parse("http://example.org/dir/meta.json").unwrap());
        assert_eq!(ctx.resolve_link("t.csv"), "http://example.org/dir/t.csv");
        assert_eq!(
            ctx.resolve_link("http://other.org/t.csv"),
            "http://other.org/t.csv"
        );
    }

    #[test]
    fn link_without_base_passes_through() {
        let ctx = Context::new();
        assert_eq!(ctx.resolve_link("t.csv"), "t.csv");
    }

    #[test]
    fn iri_expansion_and_compaction() {
        let ctx = Context::new();
        assert_eq!(
            ctx.expand_iri("xsd:integer"),
            "http://www.w3.org/2001/XMLSchema#integer"
        );
        assert_eq!(ctx.expand_iri("Table"), "http://www.w3.org/ns/csvw#Table");
        assert_eq!(
            ctx.expand_iri("http://example.org/p"),
            "http://example.org/p"
        );
        assert_eq!(
            ctx.compact_iri("http://www.w3.org/2001/XMLSchema#date"),
            "xsd:date"
        );
    }

    #[test]
    fn rebase_keeps_language_and_prefixes() {
        let mut ctx = Context::new().with_language("de");
        ctx.declare_prefix("ex", "http://example.org/ns#");
        let rebased = ctx.rebase(Url::parse("http://example.org/t.csv").unwrap());
        assert_eq!(rebased.language(), Some("de"));
        assert_eq!(rebased.expand_iri("ex:p"), "http://example.org/ns#p");
    }
}
