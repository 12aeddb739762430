//! Tests for krai-core data model types.

use super::*;
use uuid::Uuid;

#[test]
fn document_new_starts_pending_with_no_stage() {
    let doc = Document::new(
        "manual.pdf".into(),
        "deadbeef".into(),
        1024,
        DocumentType::ServiceManual,
    );
    assert_eq!(doc.processing_status, ProcessingStatus::Pending);
    assert!(doc.current_stage.is_none());
    assert!(doc.manufacturer_id.is_none());
}

#[test]
fn manufacturer_normalize_is_case_insensitive() {
    assert_eq!(Manufacturer::normalize("HP"), Manufacturer::normalize("hp"));
    assert_eq!(Manufacturer::normalize("  Konica Minolta "), "konica minolta");
}

#[test]
fn embedding_dimension_consistency() {
    let ok = Embedding {
        id: Uuid::new_v4(),
        owner_kind: OwnerKind::Chunk,
        owner_id: Uuid::new_v4(),
        model_name: "m".into(),
        dimension: 3,
        vector: vec![0.1, 0.2, 0.3],
    };
    assert!(ok.has_consistent_dimension());

    let mismatched = Embedding {
        dimension: 4,
        ..ok
    };
    assert!(!mismatched.has_consistent_dimension());
}

#[test]
fn queue_item_idempotency_key_is_document_and_stage() {
    let doc_id = Uuid::new_v4();
    let item = QueueItem::new(doc_id, Stage::TextExtraction, 0, 3);
    assert_eq!(item.idempotency_key(), (doc_id, Stage::TextExtraction));
}

#[test]
fn retry_policy_default_matches_spec_defaults() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.backoff_base_ms, 1000);
    assert_eq!(policy.backoff_factor, 2);
    assert_eq!(policy.jitter_ms, 250);
}

#[test]
fn retry_policy_delay_grows_with_attempt() {
    let policy = RetryPolicy {
        jitter_ms: 0,
        ..RetryPolicy::default()
    };
    assert_eq!(policy.delay_for_attempt(1).as_millis(), 1000);
    assert_eq!(policy.delay_for_attempt(2).as_millis(), 2000);
    assert_eq!(policy.delay_for_attempt(3).as_millis(), 4000);
}

#[test]
fn extraction_rules_defaults_match_spec() {
    let rules = ExtractionRules::default();
    assert!((rules.min_confidence - 0.75).abs() < f32::EPSILON);
    assert_eq!(rules.max_codes_per_page, 15);
    assert_eq!(rules.context_window_chars, 200);
    assert_eq!(rules.text_window_after_chars, 2500);
}

#[test]
fn document_progress_fraction_counts_skipped_as_complete() {
    let doc_id = Uuid::new_v4();
    let mut s1 = StageStatus::not_started(doc_id, Stage::TextExtraction);
    s1.state = StageState::Completed;
    let mut s2 = StageStatus::not_started(doc_id, Stage::ErrorCodeExtraction);
    s2.state = StageState::Skipped;

    let progress = DocumentProgress {
        document_id: doc_id,
        stages: vec![s1, s2],
        completed_stages: 2,
        total_stages: 2,
    };
    assert!((progress.fraction_complete() - 1.0).abs() < f32::EPSILON);
}
