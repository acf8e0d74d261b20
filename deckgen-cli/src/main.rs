//! deckgen: personalised slide decks from a template and a records file.
//!
//! # Usage
//!
//! ```text
//! deckgen init [--dir <dir>] [--force] [--sample]
//! deckgen generate [--config <file>] [--template <pptx>] [--records <csv>]
//!                  [--converter <program>] [--no-render] [--json]
//! deckgen preview <row> [--config <file>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{generate::GenerateArgs, init::InitArgs, preview::PreviewArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "deckgen",
    version,
    about = "Generate one slide deck and PDF per data row from a template",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default deckgen.yaml (and optionally a sample template and data).
    Init(InitArgs),

    /// Generate a deck and its rendering for every record.
    Generate(GenerateArgs),

    /// Show what a single record would change in the template.
    Preview(PreviewArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Generate(args) => args.run(),
        Commands::Preview(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
