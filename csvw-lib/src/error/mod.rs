use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum CsvwError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unknown metadata type: {0}")]
    MetadataType(String),
    #[error("Invalid metadata:\n{}", .0.join("\n"))]
    MetadataValidation(Vec<String>),
    #[error("Merge error: {0}")]
    Merge(String),
    #[error("Invalid dialect: {0}")]
    Dialect(String),
    #[error("Row {source_number} has {got} fields, expected {want}")]
    RowWidth {
        source_number: u64,
        got: usize,
        want: usize,
    },
}

impl From<CsvwError> for Diagnostic {
    fn from(error: CsvwError) -> Self {
        match error {
            CsvwError::Io(e) => Diagnostic::new(e.to_string(), Some("io_operation".into())),
            CsvwError::Json(e) => Diagnostic::new(e.to_string(), Some("json_parsing".into())),
            CsvwError::Csv(e) => Diagnostic::new(e.to_string(), Some("csv_parsing".into())),
            CsvwError::MetadataType(e) => Diagnostic::new(e, Some("metadata_type".into())),
            CsvwError::MetadataValidation(errors) => {
                Diagnostic::new(errors.join("\n"), Some("metadata_validation".into()))
            }
            CsvwError::Merge(e) => Diagnostic::new(e, Some("metadata_merge".into())),
            CsvwError::Dialect(e) => Diagnostic::new(e, Some("dialect".into())),
            e @ CsvwError::RowWidth { .. } => {
                Diagnostic::new(e.to_string(), Some("row_iteration".into()))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    source: Option<String>,
    message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, source: Option<String>) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Collector for recoverable problems encountered while parsing, normalizing
/// or iterating. Threaded through explicitly; there is no global sink.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<Diagnostic>,
    errors: Vec<Diagnostic>,
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.has_warnings() {
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  {}", warning.message)?;
            }
        }

        if self.has_errors() {
            writeln!(f, "Errors:")?;
            for error in &self.errors {
                writeln!(f, "  {}", error.message)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_warning(&mut self, message: impl Into<String>, source: Option<String>) {
        self.warnings.push(Diagnostic::new(message, source));
    }

    pub fn add_error(&mut self, message: impl Into<String>, source: Option<String>) {
        self.errors.push(Diagnostic::new(message, source));
    }

    pub fn add_error_from<T: Into<Diagnostic>>(&mut self, error: T) {
        self.errors.push(error.into());
    }

    pub fn add_warning_from<T: Into<Diagnostic>>(&mut self, error: T) {
        self.warnings.push(error.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn get_warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn get_errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

#[derive(Debug)]
pub enum Outcome {
    Success,
    SuccessWithWarnings(Vec<Diagnostic>),
    Failure {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },
}

impl Outcome {
    pub fn from_diagnostics(diagnostics: Diagnostics) -> Self {
        if diagnostics.errors.is_empty() && diagnostics.warnings.is_empty() {
            Outcome::Success
        } else if diagnostics.has_errors() {
            Outcome::Failure {
                errors: diagnostics.errors,
                warnings: diagnostics.warnings,
            }
        } else {
            Outcome::SuccessWithWarnings(diagnostics.warnings)
        }
    }

    pub fn take_messages(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        match self {
            Outcome::Success => (Vec::new(), Vec::new()),
            Outcome::SuccessWithWarnings(warnings) => (Vec::new(), warnings),
            Outcome::Failure { errors, warnings } => (errors, warnings),
        }
    }

    pub fn report(self) -> Result<(), anyhow::Error> {
        match self {
            Outcome::Success => {
                info!("Processing completed successfully");
            }
            Outcome::SuccessWithWarnings(warnings) => {
                warn!("Processing completed with warnings:");
                for warning in warnings {
                    if let Some(source) = warning.source {
                        warn!("[{}] {}", source, warning.message);
                    } else {
                        warn!("{}", warning.message);
                    }
                }
            }
            Outcome::Failure { errors, warnings } => {
                if !warnings.is_empty() {
                    warn!("--- Warnings ---");
                    for warning in warnings {
                        if let Some(source) = warning.source {
                            warn!("[{}] {}", source, warning.message);
                        } else {
                            warn!("{}", warning.message);
                        }
                    }
                }

                error!("--- Errors ---");
                for error in errors {
                    if let Some(source) = error.source {
                        error!("[{}] {}", source, error.message);
                    } else {
                        error!("{}", error.message);
                    }
                }
                anyhow::bail!("Processing failed with errors");
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_reflects_collected_diagnostics() {
        let mut diags = Diagnostics::new();
        assert!(matches!(
            Outcome::from_diagnostics(diags.clone()),
            Outcome::Success
        ));

        diags.add_warning("delimiter defaulted", Some("dialect".into()));
        assert!(matches!(
            Outcome::from_diagnostics(diags.clone()),
            Outcome::SuccessWithWarnings(_)
        ));

        diags.add_error("tables is required", Some("metadata_validation".into()));
        let (errors, warnings) = Outcome::from_diagnostics(diags).take_messages();
        assert_eq!(errors.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn merge_keeps_both_sides() {
        let mut a = Diagnostics::new();
        a.add_warning("w1", None);
        let mut b = Diagnostics::new();
        b.add_error("e1", None);
        a.merge(b);
        assert!(a.has_warnings());
        assert!(a.has_errors());
    }
}
