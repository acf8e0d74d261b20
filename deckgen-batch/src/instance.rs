//! Per-record working copies of the template deck.
//!
//! ## Lifecycle
//!
//! 1. [`Template::instantiate`] copies the template into a private staging
//!    file (`deckgen-*.pptx`) and opens that copy.
//! 2. [`WorkingCopy::substitute`] rewrites its text nodes in memory.
//! 3. [`WorkingCopy::persist`] saves the staged copy, copies it to
//!    `<destination>.deckgen.tmp` and renames it onto the destination.
//!
//! `persist` and [`WorkingCopy::discard`] consume the working copy, so the
//! staging file is released exactly once. Any other exit path releases it
//! when the copy is dropped.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use deckgen_core::types::{Record, TokenMap};
use deckgen_template::{engine, Package, PptxPackage, SubstitutionStats};

use crate::error::{BatchError, InstanceError};

const STAGING_PREFIX: &str = "deckgen-";

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A validated, read-only template deck.
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    slide_count: usize,
    staging_dir: Option<PathBuf>,
}

impl Template {
    /// Check that `path` exists and parses as a deck with at least one slide.
    pub fn open(path: &Path) -> Result<Self, BatchError> {
        if !path.exists() {
            return Err(BatchError::TemplateNotFound {
                path: path.to_path_buf(),
            });
        }
        let package = PptxPackage::open(path).map_err(|source| BatchError::TemplateInvalid {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            "template {} has {} slides",
            path.display(),
            package.slide_count()
        );
        Ok(Template {
            path: path.to_path_buf(),
            slide_count: package.slide_count(),
            staging_dir: None,
        })
    }

    /// Stage working copies in `dir` instead of the system temp directory.
    pub fn staged_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    /// Parse the template itself, for read-only use.
    pub fn read(&self) -> Result<PptxPackage, BatchError> {
        PptxPackage::open(&self.path).map_err(|source| BatchError::TemplateInvalid {
            path: self.path.clone(),
            source,
        })
    }

    /// Copy the template into a fresh staging file and open the copy.
    pub fn instantiate(&self) -> Result<WorkingCopy, InstanceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX).suffix(".pptx");
        let staging = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|source| InstanceError::Clone {
            path: self.staging_dir.clone().unwrap_or_else(std::env::temp_dir),
            source,
        })?;

        std::fs::copy(&self.path, staging.path()).map_err(|source| InstanceError::Clone {
            path: staging.path().to_path_buf(),
            source,
        })?;
        let package = PptxPackage::open(staging.path()).map_err(InstanceError::Open)?;

        tracing::debug!("staged {} at {}", self.path.display(), staging.path().display());
        Ok(WorkingCopy { staging, package })
    }
}

// ---------------------------------------------------------------------------
// WorkingCopy
// ---------------------------------------------------------------------------

/// A private, editable copy of the template for one record.
pub struct WorkingCopy {
    staging: NamedTempFile,
    package: PptxPackage,
}

impl WorkingCopy {
    /// Location of the staging file.
    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }

    pub fn package(&self) -> &PptxPackage {
        &self.package
    }

    /// Substitute `record` into every text node and re-serialize the
    /// changed slides.
    pub fn substitute(
        &mut self,
        record: &Record,
        tokens: &TokenMap,
    ) -> Result<SubstitutionStats, InstanceError> {
        let stats = engine::apply(&mut self.package, record, tokens);
        self.package.flush().map_err(InstanceError::Substitute)?;
        Ok(stats)
    }

    /// Save the copy and move it onto `destination`, replacing any existing
    /// file. The staging file is released whatever the outcome.
    pub fn persist(mut self, destination: &Path) -> Result<(), InstanceError> {
        let result = self.write_to(destination);
        self.discard();
        result
    }

    /// Release the staging file without persisting anything.
    pub fn discard(self) {
        let path = self.staging.path().to_path_buf();
        if let Err(e) = self.staging.close() {
            tracing::warn!("failed to remove staging file {}: {e}", path.display());
        }
    }

    fn write_to(&mut self, destination: &Path) -> Result<(), InstanceError> {
        self.package.commit().map_err(InstanceError::Commit)?;

        let tmp = PathBuf::from(format!("{}.deckgen.tmp", destination.display()));
        if let Err(source) = std::fs::copy(self.staging.path(), &tmp) {
            let _ = std::fs::remove_file(&tmp);
            return Err(InstanceError::PersistFailed { path: tmp, source });
        }
        if let Err(source) = std::fs::rename(&tmp, destination) {
            let _ = std::fs::remove_file(&tmp);
            return Err(InstanceError::PersistFailed {
                path: destination.to_path_buf(),
                source,
            });
        }
        tracing::debug!("persisted {}", destination.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
