/*!
 * Error handling for the state partitioning pipeline
 *
 * Provides detailed error types with context and suggestions. Errors are
 * file-granular: a failure aborts the unit of work for one input file and is
 * reported by the orchestrator without stopping the other workers.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Partitioning library result type
pub type Result<T> = std::result::Result<T, PartitionError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum PartitionError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<u64>,
        context: ErrorContext,
    },

    /// Input header does not carry a column the pipeline needs
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        message: String,
        missing_column: Option<String>,
        found_columns: usize,
        context: ErrorContext,
    },

    /// File or directory not found with suggestions
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Postal lookup service failure
    #[error("Postal lookup failed for '{zip}': {message}")]
    Lookup {
        zip: String,
        message: String,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    /// Output partition being written when the error occurred
    pub state: Option<String>,
}

impl ErrorContext {
    /// Context pointing at a file
    pub fn for_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }
}

impl PartitionError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let suggestion = if path.extension().is_none() {
            format!(
                "Check that the directory '{}' exists. The input directory should hold the \
                NPPES CSV files (e.g. 'npidata_pfile_*.csv' or the chunks produced by 'npsplit split').",
                path.display()
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create a schema mismatch error for a required column absent from the header
    pub fn missing_column(column: &str, found_columns: usize, file: Option<PathBuf>) -> Self {
        Self::SchemaMismatch {
            message: format!(
                "Required column '{}' not found among {} header columns",
                column, found_columns
            ),
            missing_column: Some(column.to_string()),
            found_columns,
            context: ErrorContext {
                file_path: file,
                ..Default::default()
            },
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, suggestion: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    /// Attach a file path to an error that was raised without one
    pub fn with_file(self, path: &std::path::Path) -> Self {
        match self {
            Self::Io { message, source, mut context } => {
                context.file_path.get_or_insert_with(|| path.to_path_buf());
                Self::Io { message, source, context }
            }
            Self::CsvParse { message, line, mut context } => {
                context.file_path.get_or_insert_with(|| path.to_path_buf());
                Self::CsvParse { message, line, context }
            }
            Self::SchemaMismatch { message, missing_column, found_columns, mut context } => {
                context.file_path.get_or_insert_with(|| path.to_path_buf());
                Self::SchemaMismatch { message, missing_column, found_columns, context }
            }
            other => other,
        }
    }

    /// Attach the output state an error was raised for
    pub fn with_state(self, state: &str) -> Self {
        match self {
            Self::Io { message, source, mut context } => {
                context.state.get_or_insert_with(|| state.to_string());
                Self::Io { message, source, context }
            }
            Self::CsvParse { message, line, mut context } => {
                context.state.get_or_insert_with(|| state.to_string());
                Self::CsvParse { message, line, context }
            }
            other => other,
        }
    }

    /// Context of errors that carry one
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Io { context, .. }
            | Self::CsvParse { context, .. }
            | Self::SchemaMismatch { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::SchemaMismatch { missing_column: Some(column), .. } => {
                format!(
                    "{}\n\nSuggestion: the input must be an NPPES main data file (or a chunk of one) \
                    whose header includes '{}'",
                    self, column
                )
            }
            Self::Io { context: ErrorContext { state: Some(state), .. }, .. } => {
                format!("{} (while writing the {} state file)", self, state)
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for PartitionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for PartitionError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line());

        Self::CsvParse {
            message: err.to_string(),
            line,
            context: ErrorContext::default(),
        }
    }
}

impl From<config::ConfigError> for PartitionError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
            suggestion: Some("Check the config file and NPSPLIT_* environment variables".to_string()),
        }
    }
}

impl From<serde_json::Error> for PartitionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Custom {
            message: format!("JSON serialization failed: {}", err),
            suggestion: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_missing_column_message() {
        let err = PartitionError::missing_column("NPI", 12, None);
        assert!(err.to_string().contains("'NPI'"));
        assert!(err.user_message().contains("Suggestion"));
    }

    #[test]
    fn test_with_file_fills_context() {
        let err: PartitionError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        match err.with_file(Path::new("in/a.csv")) {
            PartitionError::Io { context, .. } => {
                assert_eq!(context.file_path.as_deref(), Some(Path::new("in/a.csv")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_with_state_fills_context_once() {
        let err: PartitionError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        let err = err.with_state("WY").with_state("CA");
        let context = err.context().unwrap();
        assert_eq!(context.state.as_deref(), Some("WY"));
        assert!(err.user_message().contains("WY state file"));

        let untouched = PartitionError::configuration("bad", None).with_state("WY");
        assert!(untouched.context().is_none());
    }
}
