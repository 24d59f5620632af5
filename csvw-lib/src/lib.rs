//! CSVW Processor Library
//!
//! This library reads tabular data (CSV-family text) together with a JSON
//! metadata document describing its structure, and emits a normalized
//! annotated data model from which RDF triples or JSON documents can be
//! produced.

mod atd;
mod cell;
mod context;
mod datatype;
mod dialect;
mod error;
mod loader;
mod metadata;
mod rows;
mod uri_template;

pub use cell::{Cell, Facets, NumberFormat, Value};
pub use context::{Context, CSVW_NS};
pub use dialect::{embedded_metadata, DialectOptions, TrimMode};
pub use error::{CsvwError, Diagnostic, Diagnostics, Outcome};
pub use loader::{FileLoader, LoadedDocument, Loader, METADATA_ACCEPT};
pub use metadata::{Metadata, NodeId, NodeKind, ParseOptions, Slot};
pub use rows::{Row, RowEvent};
pub use uri_template::UriTemplate;
