//! Error-code extraction scenarios driven directly by the manufacturer
//! pattern registry (spec §8 scenarios S1, S2).

use krai_core::error::Error;
use krai_core::extract::error_code::ErrorCodeExtractionOutcome;
use krai_core::pattern::PatternRegistry;

const KONICA_MINOLTA_PATTERNS: &str = r#"
[konica_minolta]
validation_regex = '^[A-Z][0-9]{4}$'

[[konica_minolta.patterns]]
regex = '\bC[0-9]{4}\b'
category = "hardware"
severity_hint = "high"
"#;

#[test]
fn known_manufacturer_clean_extraction_finds_the_code_and_solution() {
    let registry = PatternRegistry::load_from_str(KONICA_MINOLTA_PATTERNS).unwrap();
    let extractor = krai_core::extract::error_code::ErrorCodeExtractor::new(&registry);

    let page_text = "C9402 CIS LED lighting abnormally (front side)\n\
        Procedure\n1. Turn OFF the machine\n2. Reseat the CIS cable\n3. Replace the CIS unit";
    let pages = vec![(450u32, page_text.to_string())];

    let (outcome, _metrics) = extractor.extract(&pages, Some("konica_minolta")).unwrap();

    let ErrorCodeExtractionOutcome::Extracted(codes) = outcome else {
        panic!("expected codes to be extracted, got a no-manufacturer skip");
    };
    let code = codes
        .iter()
        .find(|c| c.error_code == "C9402")
        .expect("C9402 must be extracted");
    assert_eq!(code.page_number, 450);
    assert!(code.confidence_score >= 0.80, "confidence was {}", code.confidence_score);
    let solution = code.solution_text.as_deref().unwrap_or_default();
    for step in ["Turn OFF the machine", "Reseat the CIS cable", "Replace the CIS unit"] {
        assert!(solution.contains(step), "solution text missing step: {step}");
    }
}

#[test]
fn unknown_manufacturer_pattern_fails_with_rebrand_hint() {
    let registry = PatternRegistry::load_from_str(KONICA_MINOLTA_PATTERNS).unwrap();
    let extractor = krai_core::extract::error_code::ErrorCodeExtractor::new(&registry);

    let pages = vec![(1u32, "some page text".to_string())];
    let err = extractor.extract(&pages, Some("UTAX")).unwrap_err();

    let Error::ManufacturerPatternNotFound { rebrand_hints, remediations, .. } = err else {
        panic!("expected ManufacturerPatternNotFound, got {err:?}");
    };
    assert!(rebrand_hints.iter().any(|h| h.contains("kyocera")), "hints were {rebrand_hints:?}");
    assert!(!remediations.is_empty());
}

#[test]
fn no_manufacturer_resolved_skips_rather_than_fails() {
    let registry = PatternRegistry::empty();
    let extractor = krai_core::extract::error_code::ErrorCodeExtractor::new(&registry);

    let pages = vec![(1u32, "page with no manufacturer resolved yet".to_string())];
    let (outcome, _metrics) = extractor.extract(&pages, None).unwrap();

    assert_eq!(outcome, ErrorCodeExtractionOutcome::SkippedNoManufacturer);
}
