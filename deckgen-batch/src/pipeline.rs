//! Batch orchestration: one template, many records, one artifact per record.
//!
//! ## Per-record flow
//!
//! ```text
//! Start -> Cloned -> Substituted -> Persisted -> Rendered -> Completed
//! ```
//!
//! A failure in any step skips that record and the batch moves on. Only an
//! unavailable converter stops the batch: the current record keeps its
//! persisted document, and no later record is attempted.
//!
//! Records are processed sequentially, in source order, and share no state
//! beyond the read-only template and configuration.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use deckgen_core::{records, types::Record, BatchConfig, OutputArtifact};

use crate::convert::{Converter, RenderOutcome};
use crate::error::{io_err, BatchError};
use crate::instance::Template;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// When false, records complete once their document is persisted.
    pub render: bool,
    /// Directory for working copies; the system temp dir when `None`.
    pub staging_dir: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            render: true,
            staging_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// The step a skipped record failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Clone,
    Substitute,
    Persist,
    Render,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Clone => "clone",
            Step::Substitute => "substitute",
            Step::Persist => "persist",
            Step::Render => "render",
        };
        f.write_str(name)
    }
}

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    /// `rendered` is false for documents-only runs.
    Completed { rendered: bool },
    Skipped { step: Step, reason: String },
}

/// Streams captured from a converter that exited with a failure status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverterOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    /// 1-based position in the record source.
    pub record: usize,
    pub artifact: OutputArtifact,
    /// Token occurrences replaced; 0 when substitution never ran.
    pub replacements: usize,
    #[serde(flatten)]
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter_output: Option<ConverterOutput>,
}

impl RecordReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RecordStatus::Completed { .. })
    }
}

/// Machine-readable cause of an [`Abort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortKind {
    /// The converter program is missing or cannot be executed.
    ConverterUnavailable,
}

/// Why the batch stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Abort {
    /// 1-based record being processed when the batch stopped.
    pub record: usize,
    pub kind: AbortKind,
    pub reason: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records in the source, processed or not.
    pub total: usize,
    /// One entry per record that reached a terminal state.
    pub records: Vec<RecordReport>,
    pub aborted: Option<Abort>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.records.iter().filter(|r| r.is_completed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.records.len() - self.completed()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Run the batch described by `config`, rendering through `converter` when
/// `render` is set.
pub fn run(
    config: &BatchConfig,
    converter: &dyn Converter,
    render: bool,
) -> Result<BatchReport, BatchError> {
    let options = RunOptions {
        render,
        ..RunOptions::default()
    };
    run_with(config, converter, &options)
}

/// [`run`] with every knob exposed.
///
/// Startup checks happen before any record is touched and are returned as
/// [`BatchError`]. Once records are flowing the result is always a report.
pub fn run_with(
    config: &BatchConfig,
    converter: &dyn Converter,
    options: &RunOptions,
) -> Result<BatchReport, BatchError> {
    let started_at = Utc::now();

    config.validate()?;
    let mut template = Template::open(&config.template)?;
    if let Some(dir) = &options.staging_dir {
        template = template.staged_in(dir);
    }
    let rows = records::load_at(&config.records.path, config.delimiter_byte()?)?;
    ensure_dir(&config.output.documents)?;
    if options.render {
        ensure_dir(&config.output.renders)?;
    }

    let total = rows.len();
    tracing::info!(
        "generating {total} documents from {} ({} slides)",
        template.path().display(),
        template.slide_count()
    );

    let mut report = BatchReport {
        started_at,
        finished_at: started_at,
        total,
        records: Vec::with_capacity(total),
        aborted: None,
    };

    for (index, record) in rows.iter().enumerate() {
        let position = index + 1;
        match process(config, &template, converter, options, index, record) {
            Ok(entry) => {
                log_entry(&entry, total);
                report.records.push(entry);
            }
            Err(abort) => {
                tracing::error!("[{position}/{total}] aborting batch: {}", abort.reason);
                report.aborted = Some(abort);
                break;
            }
        }
    }

    report.finished_at = Utc::now();
    tracing::info!(
        "batch finished: {} total, {} completed, {} skipped{}",
        report.total,
        report.completed(),
        report.skipped(),
        if report.is_aborted() { ", aborted" } else { "" }
    );
    Ok(report)
}

/// Drive one record to a terminal state, or return [`Abort`] when the
/// converter is unavailable.
fn process(
    config: &BatchConfig,
    template: &Template,
    converter: &dyn Converter,
    options: &RunOptions,
    index: usize,
    record: &Record,
) -> Result<RecordReport, Abort> {
    let artifact = config.artifact(index);
    let mut entry = RecordReport {
        record: index + 1,
        artifact,
        replacements: 0,
        status: RecordStatus::Completed { rendered: false },
        converter_output: None,
    };
    let skip = |mut entry: RecordReport, step: Step, reason: String| {
        entry.status = RecordStatus::Skipped { step, reason };
        entry
    };

    let mut copy = match template.instantiate() {
        Ok(copy) => copy,
        Err(e) => return Ok(skip(entry, Step::Clone, e.to_string())),
    };

    match copy.substitute(record, &config.tokens) {
        Ok(stats) => {
            tracing::debug!(
                "record {}: {} replacements across {} of {} text nodes",
                entry.record,
                stats.replacements,
                stats.changed,
                stats.nodes
            );
            entry.replacements = stats.replacements;
        }
        Err(e) => {
            copy.discard();
            return Ok(skip(entry, Step::Substitute, e.to_string()));
        }
    }

    if let Err(e) = copy.persist(&entry.artifact.document) {
        return Ok(skip(entry, Step::Persist, e.to_string()));
    }

    if !options.render {
        return Ok(entry);
    }

    // A render left by an earlier run must not pass for this one.
    if let Err(e) = remove_stale(&entry.artifact.render) {
        let reason = format!(
            "cannot remove previous render {}: {e}",
            entry.artifact.render.display()
        );
        return Ok(skip(entry, Step::Render, reason));
    }

    match converter.render(&entry.artifact.document, &config.output.renders) {
        Ok(RenderOutcome::Rendered { .. }) => {
            entry.status = RecordStatus::Completed { rendered: true };
            Ok(entry)
        }
        Ok(RenderOutcome::Failed {
            code,
            stdout,
            stderr,
        }) => {
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            if !stderr.trim().is_empty() {
                tracing::warn!("record {} converter stderr:\n{}", entry.record, stderr.trim_end());
            }
            if !stdout.trim().is_empty() {
                tracing::debug!("record {} converter stdout:\n{}", entry.record, stdout.trim_end());
            }
            let reason = match first_line(&stderr).or_else(|| first_line(&stdout)) {
                Some(line) => format!("converter exited with {code}: {line}"),
                None => format!("converter exited with {code}"),
            };
            let mut entry = skip(entry, Step::Render, reason);
            entry.converter_output = Some(ConverterOutput { stdout, stderr });
            Ok(entry)
        }
        Ok(RenderOutcome::Incomplete { expected }) => {
            let reason = format!(
                "converter succeeded but {} was not produced",
                expected.display()
            );
            Ok(skip(entry, Step::Render, reason))
        }
        Err(e) if e.is_fatal() => Err(Abort {
            record: entry.record,
            kind: AbortKind::ConverterUnavailable,
            reason: e.to_string(),
        }),
        Err(e) => Ok(skip(entry, Step::Render, e.to_string())),
    }
}

fn log_entry(entry: &RecordReport, total: usize) {
    match &entry.status {
        RecordStatus::Completed { rendered: true } => tracing::info!(
            "[{}/{total}] rendered {}",
            entry.record,
            entry.artifact.render.display()
        ),
        RecordStatus::Completed { rendered: false } => tracing::info!(
            "[{}/{total}] wrote {}",
            entry.record,
            entry.artifact.document.display()
        ),
        RecordStatus::Skipped { step, reason } => {
            tracing::warn!("[{}/{total}] skipped at {step}: {reason}", entry.record)
        }
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

fn remove_stale(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn ensure_dir(path: &Path) -> Result<(), BatchError> {
    std::fs::create_dir_all(path).map_err(|e| io_err(path, e))
}
