//! Common fixtures for engine benchmarks.

use krai_core::pattern::PatternRegistry;
use krai_core::types::{Document, DocumentType};

/// A registry with one manufacturer whose patterns exercise both the
/// regex match path and the confidence-rejection path.
pub fn benchmark_pattern_registry() -> PatternRegistry {
    let toml = r#"
[acme]
validation_regex = "^E\\d{3}$"

[[acme.patterns]]
regex = "E\\d{3}"
category = "fault"
severity_hint = "high"

[[acme.patterns]]
regex = "P/N\\s*\\d+"
category = "part_number"
"#;
    PatternRegistry::load_from_str(toml).expect("benchmark pattern file is valid")
}

/// A page of text containing a realistic mix of genuine error codes and
/// part-number-shaped near misses, repeated `repetitions` times to scale
/// page length.
pub fn benchmark_page_text(repetitions: usize) -> String {
    let paragraph = "The device reported fault E042 during the startup self-test. \
         See P/N 4042 for the replacement fuser assembly. Error E017 may also \
         appear if the toner cartridge is seated incorrectly.\n";
    paragraph.repeat(repetitions)
}

pub fn benchmark_document(filename: &str) -> Document {
    Document::new(
        filename.to_string(),
        format!("sha256:{filename}"),
        4096,
        DocumentType::ServiceManual,
    )
}
