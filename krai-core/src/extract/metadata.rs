//! Product & Manufacturer Resolver (stage `metadata_extraction`, spec
//! §4.2.4). Extracts `(manufacturer_name, model_number)` candidates from
//! page text; the stage runner is the one that actually calls
//! `ensure_manufacturer`/upserts products through [`crate::storage`], so
//! this extractor stays a pure text -> candidates transform and never
//! touches storage itself.

use super::ExtractorMetrics;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;

/// A `(manufacturer_name, model_number)` pair found in document text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductCandidate {
    pub manufacturer_name: String,
    pub model_number: String,
    pub page_number: u32,
}

static MODEL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,4}-?\d{2,5}[A-Za-z]?\b").expect("static regex"));

const KNOWN_MANUFACTURERS: &[&str] = &[
    "Konica Minolta",
    "Kyocera",
    "Ricoh",
    "Canon",
    "Xerox",
    "HP",
    "Lexmark",
    "Sharp",
    "Brother",
    "Epson",
    "Toshiba",
];

pub struct ProductResolver;

impl ProductResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Scan page texts for `(manufacturer, model)` candidates. The
    /// manufacturer hint from classification (if any) is used to anchor
    /// matches: a model number is only emitted when a known manufacturer
    /// name appears within the same page, which keeps this heuristic from
    /// emitting spurious pairs for arbitrary alphanumeric tokens.
    #[must_use]
    pub fn resolve(
        &self,
        pages: &[(u32, String)],
        manufacturer_hint: Option<&str>,
    ) -> (Vec<ProductCandidate>, ExtractorMetrics) {
        let start = Instant::now();
        let mut candidates = Vec::new();
        let mut rejected = 0usize;

        for (page_number, text) in pages {
            let manufacturer = manufacturer_hint
                .map(str::to_string)
                .or_else(|| {
                    KNOWN_MANUFACTURERS
                        .iter()
                        .find(|name| text.contains(**name))
                        .map(|s| (*s).to_string())
                });

            let Some(manufacturer) = manufacturer else {
                continue;
            };

            for m in MODEL_NUMBER.find_iter(text) {
                let model_number = m.as_str().to_string();
                if model_number.len() < 3 {
                    rejected += 1;
                    continue;
                }
                candidates.push(ProductCandidate {
                    manufacturer_name: manufacturer.clone(),
                    model_number,
                    page_number: *page_number,
                });
            }
        }

        candidates.sort_by(|a, b| a.model_number.cmp(&b.model_number));
        candidates.dedup();

        let metrics = ExtractorMetrics::from_duration(candidates.len(), rejected, start.elapsed());
        (candidates, metrics)
    }
}

impl Default for ProductResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_model_numbers_anchored_to_manufacturer() {
        let resolver = ProductResolver::new();
        let pages = vec![(
            1,
            "Konica Minolta bizhub C658 service manual. Model C658 supersedes C554.".to_string(),
        )];
        let (candidates, _) = resolver.resolve(&pages, Some("Konica Minolta"));
        assert!(candidates
            .iter()
            .any(|c| c.model_number == "C658" && c.manufacturer_name == "Konica Minolta"));
    }

    #[test]
    fn no_manufacturer_hint_and_no_known_name_yields_nothing() {
        let resolver = ProductResolver::new();
        let pages = vec![(1, "random text with A1234 in it".to_string())];
        let (candidates, _) = resolver.resolve(&pages, None);
        assert!(candidates.is_empty());
    }
}
