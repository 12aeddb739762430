//! The on-disk pattern file format (spec §6): a single TOML document
//! mapping `manufacturer_key -> { patterns, validation_regex,
//! extraction_rules }`. `deny_unknown_fields` gives us the "schema
//! validator rejects unknown fields" requirement for free; required
//! fields are enforced by not implementing `Default` for the raw shapes
//! that must be present (`validation_regex`, `patterns`).

use crate::types::ExtractionRules;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of `patterns[*]` before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPattern {
    pub regex: String,
    pub category: String,
    #[serde(default)]
    pub severity_hint: Option<String>,
}

/// One manufacturer's raw, uncompiled pattern set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternFileEntry {
    pub patterns: Vec<RawPattern>,
    pub validation_regex: String,
    #[serde(default)]
    pub extraction_rules: ExtractionRules,
}

/// The whole pattern file: manufacturer key -> entry. Keys are stored
/// exactly as written in the file; lookup normalization happens in
/// [`super::registry::PatternRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternFile {
    pub manufacturers: BTreeMap<String, PatternFileEntry>,
}

/// A validation failure encountered while loading a pattern file, reported
/// as [`crate::error::Error::PatternSnapshotInvalid`] by the registry.
#[derive(Debug, thiserror::Error)]
pub enum PatternSchemaError {
    #[error("failed to parse pattern file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("manufacturer {manufacturer_key:?}: invalid regex in pattern {index}: {source}")]
    InvalidPatternRegex {
        manufacturer_key: String,
        index: usize,
        source: regex::Error,
    },

    #[error("manufacturer {manufacturer_key:?}: invalid validation_regex: {source}")]
    InvalidValidationRegex {
        manufacturer_key: String,
        source: regex::Error,
    },

    #[error("manufacturer {manufacturer_key:?} has an empty patterns list")]
    EmptyPatternList { manufacturer_key: String },
}

impl PatternFile {
    /// Parse and schema-validate a pattern file's TOML contents. Does not
    /// compile regexes (that happens in [`super::registry::PatternRegistry`]
    /// so the same validation path covers both static analysis and actual
    /// use), but does reject empty pattern lists, which a regex compiler
    /// alone would not catch.
    pub fn parse(contents: &str) -> Result<Self, PatternSchemaError> {
        let file: PatternFile = toml::from_str(contents)?;
        for (key, entry) in &file.manufacturers {
            if entry.patterns.is_empty() {
                return Err(PatternSchemaError::EmptyPatternList {
                    manufacturer_key: key.clone(),
                });
            }
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[konica_minolta]
validation_regex = "^[A-Z]?[0-9]{4,5}$"

[[konica_minolta.patterns]]
regex = '\bC[0-9]{4}\b'
category = "hardware"
severity_hint = "high"

[konica_minolta.extraction_rules]
min_confidence = 0.8
max_codes_per_page = 10
context_window_chars = 150
text_window_after_chars = 2000
"#;

    #[test]
    fn parses_valid_file() {
        let file = PatternFile::parse(SAMPLE).unwrap();
        let entry = file.manufacturers.get("konica_minolta").unwrap();
        assert_eq!(entry.patterns.len(), 1);
        assert!((entry.extraction_rules.min_confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_unknown_fields() {
        let bad = SAMPLE.replace("category", "unknown_field");
        assert!(PatternFile::parse(&bad).is_err());
    }

    #[test]
    fn rejects_empty_pattern_list() {
        let bad = r#"
[utax]
validation_regex = "^.*$"
patterns = []
"#;
        let err = PatternFile::parse(bad).unwrap_err();
        assert!(matches!(err, PatternSchemaError::EmptyPatternList { .. }));
    }
}
