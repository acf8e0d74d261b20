//! `deckgen init [--dir <dir>] [--force] [--sample]`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use deckgen_core::{config, BatchConfig};
use deckgen_template::sample::{default_slides, sample_deck};

const SAMPLE_RECORDS: &str = "NOM_COMPLET,AUTRE\n\
Ada Lovelace,Analytical Engines\n\
Grace Hopper,Compilers\n\
Alan Turing,Computability\n";

/// Write a default configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialise.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite files that already exist.
    #[arg(long)]
    pub force: bool,

    /// Also write a sample template.pptx and data.csv.
    #[arg(long)]
    pub sample: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create '{}'", self.dir.display()))?;

        let defaults = BatchConfig::default();
        let config_path = self.dir.join(config::DEFAULT_FILE_NAME);
        let template = self.dir.join(&defaults.template);
        let records = self.dir.join(&defaults.records.path);

        self.check_free(&config_path)?;
        if self.sample {
            self.check_free(&template)?;
            self.check_free(&records)?;
        }

        config::save_at(&config_path, &defaults)
            .with_context(|| format!("failed to write '{}'", config_path.display()))?;
        println!("✓ Wrote {}", config_path.display());

        if self.sample {
            let deck = sample_deck(&default_slides()).context("failed to build sample deck")?;
            fs::write(&template, deck)
                .with_context(|| format!("failed to write '{}'", template.display()))?;
            println!("✓ Wrote {}", template.display());

            fs::write(&records, SAMPLE_RECORDS)
                .with_context(|| format!("failed to write '{}'", records.display()))?;
            println!("✓ Wrote {}", records.display());
        }

        println!("  Next: deckgen preview 1, then deckgen generate");
        Ok(())
    }

    fn check_free(&self, path: &Path) -> Result<()> {
        if path.exists() && !self.force {
            bail!(
                "'{}' already exists (use --force to overwrite)",
                path.display()
            );
        }
        Ok(())
    }
}
