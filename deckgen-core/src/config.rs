//! Batch configuration.
//!
//! A [`BatchConfig`] is built once at startup, either from defaults or from a
//! `deckgen.yaml` file, and then passed by reference to the pipeline. Every
//! section is optional in the file:
//!
//! ```yaml
//! template: template.pptx
//! records:
//!   path: data.csv
//!   delimiter: ","
//! output:
//!   documents: generated_Orga_pptx
//!   renders: generated_Orga_pdf
//!   prefix: artifact
//! converter:
//!   program: soffice
//!   format: pdf
//! tokens:
//!   - token: "[[VOTRE_BALISE]]"
//!     field: NOM_COMPLET
//! ```
//!
//! Relative paths resolve against the directory holding the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{OutputArtifact, TokenMap};

/// File name looked up by the CLI when `--config` is not given.
pub const DEFAULT_FILE_NAME: &str = "deckgen.yaml";

pub const DEFAULT_TEMPLATE: &str = "template.pptx";
pub const DEFAULT_RECORDS: &str = "data.csv";
pub const DEFAULT_DOCUMENTS_DIR: &str = "generated_Orga_pptx";
pub const DEFAULT_RENDERS_DIR: &str = "generated_Orga_pdf";
pub const DEFAULT_PREFIX: &str = "artifact";
pub const DEFAULT_CONVERTER: &str = "soffice";
pub const DEFAULT_FORMAT: &str = "pdf";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordsConfig {
    pub path: PathBuf,
    pub delimiter: char,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        RecordsConfig {
            path: PathBuf::from(DEFAULT_RECORDS),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory receiving the generated decks.
    pub documents: PathBuf,
    /// Directory receiving the converter's output.
    pub renders: PathBuf,
    /// Artifact base name; record `n` (1-based) becomes `<prefix>_<n>`.
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            documents: PathBuf::from(DEFAULT_DOCUMENTS_DIR),
            renders: PathBuf::from(DEFAULT_RENDERS_DIR),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Executable name (looked up on `PATH`) or path.
    pub program: String,
    /// Value passed to `--convert-to`, e.g. `pdf` or `pdf:writer_pdf_Export`.
    pub format: String,
}

impl ConverterConfig {
    /// File extension the converter produces: the format up to any `:` filter.
    pub fn output_extension(&self) -> &str {
        self.format.split(':').next().unwrap_or(&self.format)
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            program: DEFAULT_CONVERTER.to_string(),
            format: DEFAULT_FORMAT.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// BatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub template: PathBuf,
    pub records: RecordsConfig,
    pub output: OutputConfig,
    pub converter: ConverterConfig,
    pub tokens: TokenMap,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            template: PathBuf::from(DEFAULT_TEMPLATE),
            records: RecordsConfig::default(),
            output: OutputConfig::default(),
            converter: ConverterConfig::default(),
            tokens: default_tokens(),
        }
    }
}

/// Placeholder table used when no configuration file supplies one.
pub fn default_tokens() -> TokenMap {
    TokenMap::new([("[[VOTRE_BALISE]]", "NOM_COMPLET"), ("[[SUJET]]", "AUTRE")])
}

impl BatchConfig {
    /// Rebase every relative path onto `base`.
    ///
    /// The converter program is only rebased when it names a path
    /// (`bin/soffice`); a bare name stays a `PATH` lookup.
    pub fn resolve(mut self, base: &Path) -> Self {
        self.template = rebase(base, self.template);
        self.records.path = rebase(base, self.records.path);
        self.output.documents = rebase(base, self.output.documents);
        self.output.renders = rebase(base, self.output.renders);
        if Path::new(&self.converter.program).components().count() > 1 {
            let program = rebase(base, PathBuf::from(&self.converter.program));
            self.converter.program = program.to_string_lossy().into_owned();
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.delimiter_byte()?;
        if self.output.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        let delimiter = self.records.delimiter;
        if delimiter.is_ascii() {
            Ok(delimiter as u8)
        } else {
            Err(ConfigError::InvalidDelimiter(delimiter))
        }
    }

    /// Output paths for the record at 0-based `index`.
    pub fn artifact(&self, index: usize) -> OutputArtifact {
        let stem = format!("{}_{}", self.output.prefix, index + 1);
        let document_ext = self
            .template
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("pptx");
        OutputArtifact {
            document: self
                .output
                .documents
                .join(format!("{stem}.{document_ext}")),
            render: self
                .output
                .renders
                .join(format!("{stem}.{}", self.converter.output_extension())),
        }
    }
}

fn rebase(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load, validate and resolve the configuration file at `path`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<BatchConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: BatchConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve(base))
}

/// Atomically write `config` to `path`.
///
/// Write flow: serialize → `.tmp` sibling → `rename`.
pub fn save_at(path: &Path, config: &BatchConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
