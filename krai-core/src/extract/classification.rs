//! Metadata & Classification Extractor (stage `classification`, spec
//! §4.2.3). Pure heuristic: filename substring checks plus boilerplate
//! content cues, no external dependency. Low confidence is never fatal —
//! it is reported so the stage completes with a warning, per the spec's
//! explicit design (and the preserved Open Question about whether it
//! should ever gate downstream stages).

use super::ExtractorMetrics;
use crate::types::DocumentType;
use std::time::Instant;

/// Output of the classification stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutput {
    pub document_type: DocumentType,
    pub confidence: f32,
    pub manufacturer_hint: Option<String>,
    pub language: Option<String>,
    pub low_confidence_warning: bool,
}

/// Confidence below this threshold marks `LowConfidenceWarning` but never
/// fails the stage (spec §4.2.3).
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;

const FILENAME_HINTS: &[(&str, DocumentType)] = &[
    ("service manual", DocumentType::ServiceManual),
    ("service_manual", DocumentType::ServiceManual),
    ("sm", DocumentType::ServiceManual),
    ("parts catalog", DocumentType::PartsCatalog),
    ("parts_catalog", DocumentType::PartsCatalog),
    ("parts list", DocumentType::PartsCatalog),
    ("bulletin", DocumentType::TechnicalBulletin),
    ("tb", DocumentType::TechnicalBulletin),
    ("cpmd", DocumentType::CpmdDatabase),
    ("user manual", DocumentType::UserManual),
    ("user_guide", DocumentType::UserManual),
    ("installation", DocumentType::InstallationGuide),
    ("install guide", DocumentType::InstallationGuide),
    ("troubleshooting", DocumentType::TroubleshootingGuide),
    ("trouble shooting", DocumentType::TroubleshootingGuide),
];

const CONTENT_CUES: &[(&str, DocumentType)] = &[
    ("removal and replacement", DocumentType::ServiceManual),
    ("disassembly", DocumentType::ServiceManual),
    ("firmware update procedure", DocumentType::ServiceManual),
    ("part number", DocumentType::PartsCatalog),
    ("exploded view", DocumentType::PartsCatalog),
    ("reference number", DocumentType::PartsCatalog),
    ("this bulletin applies to", DocumentType::TechnicalBulletin),
    ("service advisory", DocumentType::TechnicalBulletin),
    ("call for parts and maintenance data", DocumentType::CpmdDatabase),
    ("getting started", DocumentType::UserManual),
    ("unpacking", DocumentType::InstallationGuide),
    ("site preparation", DocumentType::InstallationGuide),
    ("symptom", DocumentType::TroubleshootingGuide),
    ("possible cause", DocumentType::TroubleshootingGuide),
];

/// Manufacturer names the content-cue scan looks for directly. A real
/// deployment would widen this from the manufacturer table; the engine
/// itself (spec §1 Non-goals) does not learn new names on its own.
const KNOWN_MANUFACTURERS: &[&str] = &[
    "konica minolta",
    "kyocera",
    "ricoh",
    "canon",
    "xerox",
    "hp",
    "lexmark",
    "sharp",
    "brother",
    "epson",
    "toshiba",
    "utax",
];

pub struct ClassificationExtractor;

impl ClassificationExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify a document from its filename and extracted page texts.
    /// Never fails — see module docs.
    #[must_use]
    pub fn classify(
        &self,
        filename: &str,
        pages: &[(u32, String)],
        detected_language: Option<String>,
    ) -> (ClassificationOutput, ExtractorMetrics) {
        let start = Instant::now();
        let filename_lower = filename.to_lowercase();
        let body: String = pages
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let filename_match = FILENAME_HINTS
            .iter()
            .find(|(needle, _)| filename_lower.contains(needle))
            .map(|(_, dt)| *dt);

        let content_hits: Vec<DocumentType> = CONTENT_CUES
            .iter()
            .filter(|(needle, _)| body.contains(needle))
            .map(|(_, dt)| *dt)
            .collect();

        let (document_type, confidence) = match filename_match {
            Some(dt) if content_hits.iter().any(|&c| c == dt) => (dt, 0.95),
            Some(dt) => (dt, 0.7),
            None => {
                let mut tally: std::collections::HashMap<DocumentType, usize> =
                    std::collections::HashMap::new();
                for dt in &content_hits {
                    *tally.entry(*dt).or_insert(0) += 1;
                }
                tally
                    .into_iter()
                    .max_by_key(|(_, count)| *count)
                    .map(|(dt, count)| (dt, (0.3 + 0.15 * count as f32).min(0.85)))
                    .unwrap_or((DocumentType::ServiceManual, 0.2))
            }
        };

        let manufacturer_hint = KNOWN_MANUFACTURERS
            .iter()
            .find(|name| body.contains(**name) || filename_lower.contains(**name))
            .map(|name| titlecase(name));

        let low_confidence_warning = confidence < LOW_CONFIDENCE_THRESHOLD;

        let output = ClassificationOutput {
            document_type,
            confidence,
            manufacturer_hint,
            language: detected_language,
            low_confidence_warning,
        };
        let metrics = ExtractorMetrics::from_duration(
            1,
            usize::from(low_confidence_warning),
            start.elapsed(),
        );
        (output, metrics)
    }
}

impl Default for ClassificationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn titlecase(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_and_content_agreement_is_high_confidence() {
        let extractor = ClassificationExtractor::new();
        let pages = vec![(
            1,
            "Removal and Replacement of the fuser assembly. Konica Minolta bizhub.".to_string(),
        )];
        let (out, _) = extractor.classify("bizhub_service_manual.pdf", &pages, None);
        assert_eq!(out.document_type, DocumentType::ServiceManual);
        assert!(out.confidence > 0.9);
        assert_eq!(out.manufacturer_hint.as_deref(), Some("Konica Minolta"));
        assert!(!out.low_confidence_warning);
    }

    #[test]
    fn unrecognized_document_is_low_confidence_but_not_fatal() {
        let extractor = ClassificationExtractor::new();
        let pages = vec![(1, "hello world".to_string())];
        let (out, metrics) = extractor.classify("random.pdf", &pages, None);
        assert!(out.low_confidence_warning);
        assert_eq!(metrics.items_rejected, 1);
    }
}
