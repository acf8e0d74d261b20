pub mod generate;
pub mod init;
pub mod preview;

use std::path::Path;

use anyhow::{Context, Result};

use deckgen_core::{config, BatchConfig};

/// Load `--config` when given, else `./deckgen.yaml` when present, else the
/// built-in defaults (relative to the working directory).
pub fn load_config(explicit: Option<&Path>) -> Result<BatchConfig> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let default = Path::new(config::DEFAULT_FILE_NAME);
            if !default.exists() {
                return Ok(BatchConfig::default());
            }
            default
        }
    };
    config::load_at(path).with_context(|| format!("failed to load config '{}'", path.display()))
}
