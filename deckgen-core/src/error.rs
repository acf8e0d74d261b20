//! Error types for deckgen-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or saving a [`BatchConfig`](crate::config::BatchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// The csv reader only accepts single-byte delimiters.
    #[error("records delimiter {0:?} is not a single ASCII character")]
    InvalidDelimiter(char),

    #[error("output prefix must not be empty")]
    EmptyPrefix,
}

/// Errors from the record source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("records file not found at {path}")]
    NotFound { path: PathBuf },

    /// The file parsed but held no data rows.
    #[error("records file {path} contains no data rows")]
    Empty { path: PathBuf },

    #[error("failed to read records from {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
