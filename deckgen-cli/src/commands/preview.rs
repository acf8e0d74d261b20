//! `deckgen preview <row>`: unified diff of one record's substitutions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use deckgen_batch::preview_record;

/// Arguments for `deckgen preview`.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// 1-based record number.
    pub row: usize,

    /// Configuration file (default: ./deckgen.yaml when present).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl PreviewArgs {
    pub fn run(self) -> Result<()> {
        let config = super::load_config(self.config.as_deref())?;
        let preview = preview_record(&config, self.row)
            .with_context(|| format!("preview failed for record {}", self.row))?;

        if preview.changes.is_empty() {
            println!("No changes for record {}.", preview.record);
        }
        for change in &preview.changes {
            print!("{}", change.unified_diff);
            if !change.unified_diff.ends_with('\n') {
                println!();
            }
        }

        if !preview.unresolved.is_empty() {
            let tokens: Vec<&str> = preview.unresolved.iter().map(|t| t.as_str()).collect();
            println!(
                "{} unresolved tokens: {}",
                "!".yellow().bold(),
                tokens.join(", ")
            );
        }
        Ok(())
    }
}
