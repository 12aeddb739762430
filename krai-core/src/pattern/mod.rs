//! Manufacturer Pattern Registry (spec §4.1).
//!
//! A declarative, file-backed mapping from manufacturer key to error-code
//! regex patterns, a validation rule, and extraction rules, shared by the
//! error-code extractor. The registry never falls back to a generic
//! pattern set: a manufacturer with no registered patterns is a hard
//! failure ([`crate::error::Error::ManufacturerPatternNotFound`]), because
//! generic matching was the dominant source of false positives (part
//! numbers, page numbers) the manufacturer-specific patterns replace.

mod file;
mod fuzzy;
mod registry;
mod rebrand;

pub use file::{PatternFile, PatternFileEntry, PatternSchemaError, RawPattern};
pub use fuzzy::fuzzy_suggestions;
pub use registry::{CompiledPattern, PatternRegistry, PatternSet};
pub use rebrand::rebrand_hints;
