//! Rendering persisted decks through an external converter.
//!
//! The [`Converter`] trait is the seam between the pipeline and the process
//! it launches; [`SofficeConverter`] is the LibreOffice implementation:
//!
//! ```text
//! <program> --headless --convert-to <format> <source> --outdir <out_dir>
//! ```
//!
//! The call blocks until the converter exits. There is no timeout: a hung
//! converter blocks the batch.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use deckgen_core::config::ConverterConfig;

use crate::error::ConvertError;

/// Result of a converter run that did start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The converter exited cleanly and the expected file exists.
    Rendered { path: PathBuf },
    /// The converter exited with a failure status.
    Failed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The converter exited cleanly but produced no output at `expected`.
    Incomplete { expected: PathBuf },
}

/// Renders a document file into `out_dir`.
pub trait Converter {
    fn render(&self, source: &Path, out_dir: &Path) -> Result<RenderOutcome, ConvertError>;
}

/// Headless LibreOffice (`soffice`) or any program taking the same arguments.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    config: ConverterConfig,
}

impl SofficeConverter {
    pub fn new(config: ConverterConfig) -> Self {
        SofficeConverter { config }
    }

    pub fn program(&self) -> &str {
        &self.config.program
    }

    /// `<out_dir>/<source stem>.<format extension>`.
    pub fn expected_output(&self, source: &Path, out_dir: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        out_dir.join(format!("{stem}.{}", self.config.output_extension()))
    }

    fn command(&self, source: &Path, out_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg(&self.config.format)
            .arg(source)
            .arg("--outdir")
            .arg(out_dir)
            .stdin(Stdio::null());
        cmd
    }
}

impl Default for SofficeConverter {
    fn default() -> Self {
        SofficeConverter::new(ConverterConfig::default())
    }
}

impl Converter for SofficeConverter {
    fn render(&self, source: &Path, out_dir: &Path) -> Result<RenderOutcome, ConvertError> {
        tracing::debug!(
            "running {} for {} into {}",
            self.config.program,
            source.display(),
            out_dir.display()
        );
        let output = match self.command(source, out_dir).output() {
            Ok(output) => output,
            Err(source) => return Err(classify_spawn_error(&self.config.program, source)),
        };

        if !output.status.success() {
            return Ok(RenderOutcome::Failed {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let expected = self.expected_output(source, out_dir);
        if expected.exists() {
            Ok(RenderOutcome::Rendered { path: expected })
        } else {
            Ok(RenderOutcome::Incomplete { expected })
        }
    }
}

fn classify_spawn_error(program: &str, source: std::io::Error) -> ConvertError {
    let program = program.to_string();
    match source.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            ConvertError::Unavailable { program, source }
        }
        _ => ConvertError::Spawn { program, source },
    }
}
