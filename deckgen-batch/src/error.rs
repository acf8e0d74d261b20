//! Error types for deckgen-batch.
//!
//! [`BatchError`] stops a run before the first record. [`InstanceError`] and
//! [`ConvertError::Spawn`] only skip the record they happened in, while
//! [`ConvertError::Unavailable`] aborts the remaining batch.

use std::path::PathBuf;

use thiserror::Error;

use deckgen_core::{ConfigError, SourceError};
use deckgen_template::PackageError;

/// Errors that prevent a batch from starting.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("record source error: {0}")]
    Source(#[from] SourceError),

    #[error("template not found at {path}")]
    TemplateNotFound { path: PathBuf },

    /// The template exists but is not a usable deck.
    #[error("template {path} is not a valid deck: {source}")]
    TemplateInvalid {
        path: PathBuf,
        #[source]
        source: PackageError,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `preview` asked for a row the record source does not have.
    #[error("record {row} is out of range (1..={total})")]
    RowOutOfRange { row: usize, total: usize },
}

/// Failures while producing one record's document.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// Copying the template into the staging file failed.
    #[error("failed to stage template copy at {path}: {source}")]
    Clone {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The staged copy could not be opened as a deck.
    #[error("failed to open staged copy: {0}")]
    Open(#[source] PackageError),

    /// Changed slides could not be re-serialized.
    #[error("failed to apply substitution: {0}")]
    Substitute(#[source] PackageError),

    /// Writing the package back into the staging file failed.
    #[error("failed to save staged copy: {0}")]
    Commit(#[source] PackageError),

    /// Moving the staged copy to its destination failed.
    #[error("failed to persist document to {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures launching the converter.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The converter program is missing or not executable. Fatal for the run.
    #[error("converter `{program}` is unavailable: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure to start or wait on the converter process.
    #[error("failed to run converter `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    /// Whether this error ends the whole batch rather than one record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConvertError::Unavailable { .. })
    }
}

/// Convenience constructor for [`BatchError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BatchError {
    BatchError::Io {
        path: path.into(),
        source,
    }
}
