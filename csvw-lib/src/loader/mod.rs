//! Byte retrieval behind a small trait, plus linked-metadata discovery for
//! CSV inputs. Only a filesystem loader ships here; an HTTP implementation
//! plugs in through the same trait and should send [`METADATA_ACCEPT`].

use std::io;

use serde_json::Value as JsonValue;
use tracing::{debug, info};
use url::Url;

use crate::dialect::{embedded_metadata, DialectOptions};
use crate::error::{CsvwError, Diagnostics};
use crate::metadata::{Metadata, NodeKind, ParseOptions};

/// Accept header for metadata document requests.
pub const METADATA_ACCEPT: &str = "application/ld+json, application/json";

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub url: Url,
    pub bytes: Vec<u8>,
    /// Target of a `Link: rel=describedby` response header, when the
    /// transport carries one.
    pub described_by: Option<String>,
}

pub trait Loader {
    fn fetch(&self, url: &Url) -> Result<LoadedDocument, CsvwError>;
}

/// Loader for `file:` URLs.
#[derive(Debug, Default)]
pub struct FileLoader;

impl Loader for FileLoader {
    fn fetch(&self, url: &Url) -> Result<LoadedDocument, CsvwError> {
        let path = url.to_file_path().map_err(|_| {
            CsvwError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot read non-file url {}", url),
            ))
        })?;
        let bytes = std::fs::read(path)?;
        Ok(LoadedDocument {
            url: url.clone(),
            bytes,
            described_by: None,
        })
    }
}

impl Metadata {
    /// Load and parse a metadata document from a URL.
    pub fn open(
        url: &Url,
        options: ParseOptions,
        loader: &dyn Loader,
    ) -> Result<Metadata, CsvwError> {
        let document = loader.fetch(url)?;
        let json: JsonValue = serde_json::from_slice(&document.bytes)?;
        let options = ParseOptions {
            base: Some(url.clone()),
            ..options
        };
        let mut metadata = Metadata::parse(&json, options)?;
        metadata.resolve_linked_objects(loader);
        Ok(metadata)
    }

    /// Build a TableGroup for a CSV input by linked-metadata discovery.
    ///
    /// Candidate metadata locations are tried in order: the stream's
    /// `describedby` link, `<url>-metadata.json`, then `metadata.json`
    /// alongside the input. The first candidate that parses wins; failures
    /// are swallowed. Embedded metadata extracted from the header is
    /// compatibility-checked against the winner and merged; without a winner
    /// the embedded metadata stands alone.
    pub fn for_input(
        input: &LoadedDocument,
        options: ParseOptions,
        loader: &dyn Loader,
    ) -> Result<Metadata, CsvwError> {
        let user = discover_metadata(input, &options, loader);

        let mut dialect_diagnostics = Diagnostics::new();
        let dialect = match &user {
            Some(user) => user
                .first_table()
                .map(|t| DialectOptions::for_table(user, t, &mut dialect_diagnostics))
                .unwrap_or_default(),
            None => DialectOptions::default(),
        };

        let embedded_json = embedded_metadata(
            input.bytes.as_slice(),
            input.url.as_str(),
            &dialect,
            options.default_language.as_deref(),
        )?;
        let embedded = Metadata::parse(
            &embedded_json,
            ParseOptions {
                base: Some(input.url.clone()),
                default_language: options.default_language.clone(),
                type_hint: Some(NodeKind::Table),
            },
        )?;

        match user {
            Some(user) => {
                user.verify_compatible(&embedded)?;
                user.merge(&embedded)
            }
            None => Ok(embedded),
        }
    }
}

fn discover_metadata(
    input: &LoadedDocument,
    options: &ParseOptions,
    loader: &dyn Loader,
) -> Option<Metadata> {
    let mut candidates: Vec<Url> = Vec::new();
    if let Some(link) = &input.described_by {
        if let Ok(url) = input.url.join(link) {
            candidates.push(url);
        }
    }
    if let Ok(url) = Url::parse(&format!("{}-metadata.json", input.url)) {
        candidates.push(url);
    }
    if let Ok(url) = input.url.join("metadata.json") {
        candidates.push(url);
    }

    for candidate in candidates {
        match Metadata::open(&candidate, options.clone(), loader) {
            Ok(metadata) => {
                info!("using metadata from {}", candidate);
                return Some(metadata.normalize());
            }
            Err(error) => {
                debug!("no usable metadata at {}: {}", candidate, error);
            }
        }
    }
    None
}
