use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csvw::{FileLoader, Loader, Metadata, ParseOptions, RowEvent};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use url::Url;

/// CSVW Processor
/// Reads CSV files with their JSON metadata and emits the annotated model
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output for detailed processing information
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a metadata document
    Validate {
        /// Path to the metadata file to validate
        #[arg(short, long, value_name = "PATH TO METADATA")]
        metadata: PathBuf,

        /// Fail with a non-zero exit code on validation errors
        #[arg(short, long)]
        strict: bool,
    },
    /// Produce the annotated table-group JSON for a metadata document
    Annotate {
        /// Path to the metadata file describing the tables
        #[arg(short, long, value_name = "PATH TO METADATA")]
        metadata: PathBuf,

        /// Output file for the annotated JSON (stdout when omitted)
        #[arg(short, long, value_name = "OUTPUT PATH")]
        output: Option<PathBuf>,

        /// Skip row iteration and emit only the metadata annotations
        #[arg(long)]
        metadata_only: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Validate { metadata, strict } => validate_command(metadata, *strict),
        Commands::Annotate {
            metadata,
            output,
            metadata_only,
        } => annotate_command(metadata, output, *metadata_only),
    }
}

fn load_metadata(path: &Path) -> Result<Metadata> {
    if !path.exists() {
        anyhow::bail!("Metadata file not found: {}", path.display());
    }
    let absolute = path
        .canonicalize()
        .with_context(|| format!("Cannot resolve path {}", path.display()))?;
    let url = Url::from_file_path(&absolute)
        .map_err(|_| anyhow::anyhow!("Cannot build file URL for {}", absolute.display()))?;

    info!("Loading metadata from {}", url);
    let metadata = Metadata::open(&url, ParseOptions::default(), &FileLoader)
        .context("Failed to load metadata. See errors for additional details:")?;
    Ok(metadata.normalize())
}

fn validate_command(path: &Path, strict: bool) -> Result<()> {
    let metadata = load_metadata(path)?;

    for diagnostic in metadata.diagnostics().get_warnings() {
        warn!("{}", diagnostic.message());
    }

    let errors = metadata.validate();
    if errors.is_empty() {
        info!("Metadata is valid");
        return Ok(());
    }

    for error in &errors {
        tracing::error!("{}", error);
    }
    if strict {
        anyhow::bail!("Metadata validation failed with {} error(s)", errors.len());
    }
    warn!("Metadata has {} validation error(s)", errors.len());
    Ok(())
}

fn annotate_command(path: &Path, output: &Option<PathBuf>, metadata_only: bool) -> Result<()> {
    let metadata = load_metadata(path)?;
    metadata
        .validate_strict()
        .context("Failed to validate metadata")?;

    let mut document = metadata.to_atd();

    if !metadata_only {
        let tables = metadata.tables();
        for (index, table) in tables.iter().enumerate() {
            let table_url = metadata
                .table_url(*table)
                .ok_or_else(|| anyhow::anyhow!("Table {} has no url", index + 1))?;
            let resolved = metadata.context().resolve_link(&table_url);
            let url = Url::parse(&resolved)
                .with_context(|| format!("Table url is not absolute: {}", resolved))?;

            info!("Reading rows from {}", url);
            let input = FileLoader
                .fetch(&url)
                .with_context(|| format!("Failed to read {}", url))?;

            let mut rows: Vec<JsonValue> = Vec::new();
            let mut comments: Vec<String> = Vec::new();
            metadata
                .each_row(*table, input.bytes.as_slice(), |event| match event {
                    RowEvent::Row(row) => rows.push(row.to_atd(&metadata)),
                    RowEvent::Comment(comment) => comments.push(comment),
                })
                .with_context(|| format!("Failed to iterate rows of {}", url))?;

            let table_atd = &mut document["tables"][index];
            if let Some(map) = table_atd.as_object_mut() {
                if !comments.is_empty() {
                    map.insert("rdfs:comment".to_string(), serde_json::json!(comments));
                }
                map.insert("rows".to_string(), JsonValue::Array(rows));
            }
        }
    }

    let rendered = serde_json::to_string_pretty(&document)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Annotated model written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
