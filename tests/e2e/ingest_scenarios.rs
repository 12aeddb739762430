//! End-to-end scenarios against the [`krai_core::orchestrator::DocumentProcessor`]
//! over the in-memory storage and blob backends (spec §8 scenarios S3, S4).

use krai_core::orchestrator::IngestOptions;
use krai_core::types::{DocumentType, IngestStatus, Stage};

#[tokio::test]
async fn duplicate_ingest_returns_the_same_document_id() {
    let processor = test_utils::in_memory_processor();
    let blob = b"%PDF-1.4 identical bytes".to_vec();

    let first = processor
        .ingest(
            blob.clone(),
            "x.pdf".to_string(),
            DocumentType::ServiceManual,
            IngestOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(first.status, IngestStatus::New);

    let second = processor
        .ingest(blob, "x.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(second.document_id, first.document_id);
    assert_eq!(second.status, IngestStatus::Duplicate);
}

#[tokio::test]
async fn forced_reprocess_resets_every_stage_and_restarts_at_text_extraction() {
    let processor = test_utils::in_memory_processor();
    let blob = b"%PDF-1.4 some manual".to_vec();

    let outcome = processor
        .ingest(blob, "manual.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
        .await
        .unwrap();

    processor.reprocess_document(outcome.document_id).await.unwrap();

    let progress = processor.get_status(outcome.document_id).await.unwrap();
    let text_extraction = progress
        .stages
        .iter()
        .find(|s| s.stage == Stage::TextExtraction)
        .expect("text_extraction status must be tracked");
    assert_eq!(text_extraction.state, krai_core::types::StageState::NotStarted);
}

#[tokio::test]
async fn reprocessing_a_single_stage_leaves_earlier_stages_untouched() {
    let processor = test_utils::in_memory_processor();
    let blob = b"%PDF-1.4 some manual".to_vec();

    let outcome = processor
        .ingest(blob, "manual.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
        .await
        .unwrap();

    let state_of = |progress: &krai_core::types::DocumentProgress, stage: Stage| {
        progress.stages.iter().find(|s| s.stage == stage).map(|s| s.state)
    };

    let before = processor.get_status(outcome.document_id).await.unwrap();
    assert_eq!(state_of(&before, Stage::Upload), Some(krai_core::types::StageState::Completed));

    processor.reprocess_stage(outcome.document_id, Stage::Embedding).await.unwrap();
    let after = processor.get_status(outcome.document_id).await.unwrap();

    assert_eq!(
        state_of(&before, Stage::Upload),
        state_of(&after, Stage::Upload),
        "reprocessing embedding must not reset the completed upload stage"
    );
    assert_eq!(state_of(&after, Stage::Embedding), Some(krai_core::types::StageState::NotStarted));
}
