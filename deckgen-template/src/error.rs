//! Error types for deckgen-template.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while opening or writing a document package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Filesystem error while reading or writing the package file.
    #[error("package io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a readable zip container.
    #[error("invalid package archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The archive opened but holds no `ppt/slides/slideN.xml` part.
    #[error("package {path} contains no slides")]
    NoSlides { path: PathBuf },

    /// A slide part is not well-formed XML.
    #[error("malformed XML in {part}: {reason}")]
    Malformed { part: String, reason: String },

    /// Re-serializing a part or the archive failed.
    #[error("failed to write {part}: {reason}")]
    Write { part: String, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PackageError {
    PackageError::Io {
        path: path.into(),
        source,
    }
}
