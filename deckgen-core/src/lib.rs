//! deckgen core library: domain types, the record source and batch configuration.
//!
//! - [`types`]: [`Record`], [`TokenMap`] and friends
//! - [`records`]: load records from a delimited file
//! - [`config`]: [`BatchConfig`] load / save / defaults
//! - [`error`]: [`ConfigError`], [`SourceError`]

pub mod config;
pub mod error;
pub mod records;
pub mod types;

pub use config::BatchConfig;
pub use error::{ConfigError, SourceError};
pub use types::{FieldName, OutputArtifact, Record, Token, TokenBinding, TokenMap};
