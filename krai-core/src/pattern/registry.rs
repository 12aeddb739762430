//! In-memory, immutable pattern snapshots and the registry that serves
//! them. Reload replaces the snapshot under a short-lived write lock; a
//! parse/compile failure never touches the previously installed snapshot
//! (spec §4.1: "a load failure never replaces a valid snapshot"). Readers
//! clone an `Arc` and never block each other.

use super::file::{PatternFile, PatternSchemaError};
use super::fuzzy::fuzzy_suggestions;
use super::rebrand::rebrand_hints;
use crate::error::{Error, Remediation, Result};
use crate::types::{ExtractionRules, Stage};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A single compiled pattern plus the metadata the confidence model needs.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub category: String,
    pub severity_hint: Option<String>,
    /// Higher for narrower patterns (more literal characters, fewer
    /// wildcard classes/quantifiers relative to total length). Used as
    /// the base term of the error-code extractor's confidence model.
    pub specificity: f32,
}

impl CompiledPattern {
    fn compile(raw: &super::file::RawPattern) -> Result<Self, regex::Error> {
        let regex = Regex::new(&raw.regex)?;
        let specificity = estimate_specificity(&raw.regex);
        Ok(Self {
            regex,
            category: raw.category.clone(),
            severity_hint: raw.severity_hint.clone(),
            specificity,
        })
    }
}

/// Rough literal-character ratio of a regex source: wildcard
/// metacharacters (`.`, `\d`, `\w`, `[...]`, `*`, `+`, `?`, `{..}`, `|`)
/// count less than plain characters. A pattern that is almost entirely
/// literal text (e.g. `C9402`) scores near 1.0; one built mostly from
/// character classes and quantifiers (e.g. `[A-Z]{1,2}[0-9]{3,6}`) scores
/// lower. This is a heuristic, not a formal measure — it only needs to
/// order patterns relative to each other within one manufacturer.
fn estimate_specificity(source: &str) -> f32 {
    let mut literal = 0usize;
    let mut total = 0usize;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        total += 1;
        match c {
            '.' | '*' | '+' | '?' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '(' | ')' => {}
            '\\' => {
                // Skip the escaped character; `\d`/`\w`/`\s` are wildcard
                // classes, but `\b` (word boundary) and literal escapes of
                // metacharacters don't reduce specificity.
                if let Some(next) = chars.next() {
                    total += 1;
                    if !matches!(next, 'd' | 'D' | 'w' | 'W' | 's' | 'S') {
                        literal += 1;
                    }
                }
            }
            _ => literal += 1,
        }
    }
    let ratio = if total == 0 {
        0.5
    } else {
        literal as f32 / total as f32
    };
    // A baseline of 0.5 keeps even a mostly-wildcard pattern usable (it
    // still matched *something* manufacturer-specific); the remaining
    // half scales with how literal the pattern is.
    (0.5 + 0.5 * ratio).clamp(0.1, 1.0)
}

/// The resolved, compiled pattern set for one manufacturer.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub manufacturer_key: String,
    pub patterns: Vec<CompiledPattern>,
    pub validation_regex: Regex,
    pub extraction_rules: ExtractionRules,
}

impl PatternSet {
    fn compile(key: &str, entry: &super::file::PatternFileEntry) -> Result<Self, PatternSchemaError> {
        let validation_regex =
            Regex::new(&entry.validation_regex).map_err(|source| {
                PatternSchemaError::InvalidValidationRegex {
                    manufacturer_key: key.to_string(),
                    source,
                }
            })?;
        let mut patterns = Vec::with_capacity(entry.patterns.len());
        for (index, raw) in entry.patterns.iter().enumerate() {
            let compiled =
                CompiledPattern::compile(raw).map_err(|source| PatternSchemaError::InvalidPatternRegex {
                    manufacturer_key: key.to_string(),
                    index,
                    source,
                })?;
            patterns.push(compiled);
        }
        Ok(Self {
            manufacturer_key: key.to_string(),
            patterns,
            validation_regex,
            extraction_rules: entry.extraction_rules.clone(),
        })
    }
}

struct Snapshot {
    sets: HashMap<String, Arc<PatternSet>>,
}

/// File-backed registry of manufacturer pattern sets. Cloning a
/// `PatternRegistry` is cheap (it holds only an `Arc<RwLock<..>>>`); the
/// typical deployment shares one instance across all stage-runner workers.
#[derive(Clone)]
pub struct PatternRegistry {
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
}

impl PatternRegistry {
    /// Build a registry from already-parsed file contents. Used by
    /// `krai-cli` at startup and by tests; production code typically goes
    /// through [`Self::load_from_str`] so parse errors surface uniformly.
    pub fn load_from_str(contents: &str) -> Result<Self> {
        let snapshot = Self::build_snapshot(contents)?;
        Ok(Self {
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
        })
    }

    /// Empty registry (every manufacturer lookup fails). Useful as a
    /// starting point before the first successful load.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Arc::new(Snapshot {
                sets: HashMap::new(),
            }))),
        }
    }

    fn build_snapshot(contents: &str) -> Result<Snapshot> {
        let file = PatternFile::parse(contents)
            .map_err(|e| Error::PatternSnapshotInvalid(e.to_string()))?;
        let mut sets = HashMap::with_capacity(file.manufacturers.len());
        for (key, entry) in &file.manufacturers {
            let set = PatternSet::compile(key, entry)
                .map_err(|e| Error::PatternSnapshotInvalid(e.to_string()))?;
            sets.insert(Manufacturer::normalize(key), Arc::new(set));
        }
        Ok(Snapshot { sets })
    }

    /// Atomically reload the registry from new file contents. On any parse
    /// or compile error, the previously installed snapshot is left in
    /// place and the error is returned — readers never observe a partial
    /// or invalid reload.
    pub fn reload(&self, contents: &str) -> Result<()> {
        let snapshot = Self::build_snapshot(contents)?;
        *self.snapshot.write() = Arc::new(snapshot);
        Ok(())
    }

    /// Resolve a manufacturer key (case-insensitive) to its compiled
    /// pattern set, or fail with a remediation-bearing
    /// [`Error::ManufacturerPatternNotFound`].
    pub fn get(&self, manufacturer_key: &str) -> Result<Arc<PatternSet>> {
        let normalized = Manufacturer::normalize(manufacturer_key);
        let snapshot = self.snapshot.read().clone();
        snapshot.sets.get(&normalized).cloned().ok_or_else(|| {
            let registered = snapshot.sets.keys().cloned().collect();
            Error::ManufacturerPatternNotFound {
                manufacturer_name: manufacturer_key.to_string(),
                stage: Stage::ErrorCodeExtraction,
                remediations: vec![
                    Remediation::new("copy from an existing manufacturer's pattern set")
                        .with_detail("create_patterns --name <M> --based-on <existing key>"),
                    Remediation::new("create patterns interactively")
                        .with_detail("create_patterns --name <M> --interactive"),
                    Remediation::new("hand-edit the pattern file")
                        .with_detail("add a manufacturers.<key> entry and reload"),
                ],
                rebrand_hints: rebrand_hints(manufacturer_key),
                fuzzy_suggestions: fuzzy_suggestions(manufacturer_key, &registered),
            }
        })
    }

    /// All manufacturer keys (normalized) currently registered.
    #[must_use]
    pub fn list_manufacturers(&self) -> HashSet<String> {
        self.snapshot.read().sets.keys().cloned().collect()
    }
}

/// Local alias avoiding a hard dependency from `pattern` back onto
/// `types::structs::Manufacturer` just for its normalization helper.
struct Manufacturer;
impl Manufacturer {
    fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[konica_minolta]
validation_regex = '^[A-Z]?[0-9]{4,5}$'

[[konica_minolta.patterns]]
regex = '\bC[0-9]{4}\b'
category = "hardware"
severity_hint = "high"
"#;

    #[test]
    fn get_is_case_insensitive() {
        let registry = PatternRegistry::load_from_str(SAMPLE).unwrap();
        assert!(registry.get("Konica Minolta").is_err()); // key mismatch, not casing
        assert!(registry.get("KONICA_MINOLTA").is_ok());
        assert!(registry.get("konica_minolta").is_ok());
    }

    #[test]
    fn missing_manufacturer_carries_remediations_and_rebrand_hints() {
        let registry = PatternRegistry::load_from_str(SAMPLE).unwrap();
        let err = registry.get("UTAX").unwrap_err();
        match err {
            Error::ManufacturerPatternNotFound {
                remediations,
                rebrand_hints,
                ..
            } => {
                assert_eq!(remediations.len(), 3);
                assert_eq!(rebrand_hints, vec!["utax -> kyocera".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reload_failure_keeps_previous_snapshot() {
        let registry = PatternRegistry::load_from_str(SAMPLE).unwrap();
        assert!(registry.get("konica_minolta").is_ok());
        let err = registry.reload("not valid toml {{{");
        assert!(err.is_err());
        // Previous snapshot must still resolve.
        assert!(registry.get("konica_minolta").is_ok());
    }

    #[test]
    fn more_literal_pattern_has_higher_specificity() {
        let narrow = estimate_specificity(r"\bC9402\b");
        let wide = estimate_specificity(r"[A-Z]{1,2}[0-9]{3,6}");
        assert!(narrow > wide);
    }

    #[test]
    fn list_manufacturers_reflects_snapshot() {
        let registry = PatternRegistry::load_from_str(SAMPLE).unwrap();
        let keys = registry.list_manufacturers();
        assert!(keys.contains("konica_minolta"));
    }
}
