//! `deckgen generate`: run the batch and summarise it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use deckgen_batch::{pipeline, BatchReport, RecordReport, RecordStatus, SofficeConverter};

/// Arguments for `deckgen generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Configuration file (default: ./deckgen.yaml when present).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Template deck, overriding the configuration.
    #[arg(long, value_name = "PPTX")]
    pub template: Option<PathBuf>,

    /// Records file, overriding the configuration.
    #[arg(long, value_name = "CSV")]
    pub records: Option<PathBuf>,

    /// Converter program, overriding the configuration.
    #[arg(long, value_name = "PROGRAM")]
    pub converter: Option<String>,

    /// Only write documents; skip rendering.
    #[arg(long)]
    pub no_render: bool,

    /// Emit the batch report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "#")]
    record: usize,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "output")]
    output: String,
}

impl GenerateArgs {
    pub fn run(self) -> Result<()> {
        let mut config = super::load_config(self.config.as_deref())?;
        if let Some(template) = self.template {
            config.template = template;
        }
        if let Some(records) = self.records {
            config.records.path = records;
        }
        if let Some(program) = self.converter {
            config.converter.program = program;
        }

        let converter = SofficeConverter::new(config.converter.clone());
        let report = pipeline::run(&config, &converter, !self.no_render)
            .context("batch could not start")?;

        if self.json {
            println!(
                "{}",
                report
                    .to_json_pretty()
                    .context("failed to serialize batch report")?
            );
        } else {
            print_summary(&report);
        }

        if let Some(abort) = &report.aborted {
            bail!("batch aborted at record {}: {}", abort.record, abort.reason);
        }
        Ok(())
    }
}

fn print_summary(report: &BatchReport) {
    let rows: Vec<RecordRow> = report
        .records
        .iter()
        .map(|r| RecordRow {
            record: r.record,
            status: status_label(r),
            output: output_detail(r),
        })
        .collect();
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    let mut line = format!(
        "{} total | {} completed | {} skipped | {:.1}s",
        report.total,
        report.completed().to_string().green().bold(),
        report.skipped().to_string().yellow().bold(),
        elapsed as f64 / 1000.0,
    );
    if let Some(abort) = &report.aborted {
        let not_run = report.total - report.records.len();
        line.push_str(&format!(
            " | {} at record {} ({} not processed)",
            "aborted".red().bold(),
            abort.record,
            not_run
        ));
    }
    println!("{line}");
}

fn status_label(record: &RecordReport) -> String {
    match &record.status {
        RecordStatus::Completed { rendered: true } => "✓ rendered".green().to_string(),
        RecordStatus::Completed { rendered: false } => "✓ written".green().to_string(),
        RecordStatus::Skipped { step, .. } => format!("✗ {step}").yellow().to_string(),
    }
}

fn output_detail(record: &RecordReport) -> String {
    match &record.status {
        RecordStatus::Completed { rendered: true } => record.artifact.render.display().to_string(),
        RecordStatus::Completed { rendered: false } => {
            record.artifact.document.display().to_string()
        }
        RecordStatus::Skipped { reason, .. } => reason.clone(),
    }
}
