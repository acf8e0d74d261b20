//! # deckgen-batch
//!
//! Per-record document generation and rendering.
//!
//! Call [`run`] to turn every record of the configured source into a deck
//! and its rendering, or [`preview_record`] to see what one record would
//! change without writing anything.

pub mod convert;
pub mod error;
pub mod instance;
pub mod pipeline;
pub mod preview;

pub use convert::{Converter, RenderOutcome, SofficeConverter};
pub use error::{BatchError, ConvertError, InstanceError};
pub use instance::{Template, WorkingCopy};
pub use pipeline::{
    run, run_with, Abort, AbortKind, BatchReport, ConverterOutput, RecordReport, RecordStatus,
    RunOptions, Step,
};
pub use preview::{preview_record, NodeChange, Preview};
