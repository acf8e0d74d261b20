//! # deckgen-template
//!
//! Literal-token substitution over the text nodes of a slide deck.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use deckgen_core::types::{Record, TokenMap};
//! use deckgen_template::{engine, Package, PptxPackage};
//!
//! fn personalize(deck: &Path) -> Result<(), deckgen_template::PackageError> {
//!     let tokens = TokenMap::new([("[[NAME]]", "name")]);
//!     let record = Record::from_pairs([("name", "Alice")]);
//!     let mut package = PptxPackage::open(deck)?;
//!     engine::apply(&mut package, &record, &tokens);
//!     package.commit()
//! }
//! ```

pub mod engine;
pub mod error;
pub mod package;
pub mod sample;

pub use engine::{apply, substitute, SubstitutionStats};
pub use error::PackageError;
pub use package::{Package, PptxPackage, TextNode, TextNodes};
