//! Embedding Extractor (stage `embedding`, spec §4.2.8). Thin wrapper over
//! [`EmbeddingService`] that scopes work to items not yet embedded with the
//! current model — re-running this stage after a model change is the only
//! way new rows get produced; re-running with an unchanged model is a
//! no-op (spec §8 embedding idempotence invariant).

use super::ExtractorMetrics;
use crate::embeddings::{EmbeddableItem, EmbeddingService};
use crate::error::Result;
use crate::types::{Embedding, OwnerKind};
use std::time::Instant;
use uuid::Uuid;

/// One chunk/image/table awaiting embedding, annotated with whatever
/// embeddings already exist for it so the extractor can skip items
/// already covered by the current model.
#[derive(Debug, Clone)]
pub struct EmbeddingCandidate {
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub text: String,
    pub existing_model_names: Vec<String>,
}

pub struct EmbeddingExtractor<'a> {
    service: &'a EmbeddingService,
}

impl<'a> EmbeddingExtractor<'a> {
    #[must_use]
    pub fn new(service: &'a EmbeddingService) -> Self {
        Self { service }
    }

    /// Embed every candidate not already embedded with this service's
    /// `model_name`. Stops at the first provider error or dimension
    /// mismatch, surfacing it to the stage runner for retry handling.
    pub async fn extract(&self, candidates: &[EmbeddingCandidate]) -> Result<(Vec<Embedding>, ExtractorMetrics)> {
        let start = Instant::now();
        let model_name = self.service.model_name();

        let pending: Vec<&EmbeddingCandidate> = candidates
            .iter()
            .filter(|c| !c.existing_model_names.iter().any(|m| m == model_name))
            .collect();
        let skipped = candidates.len() - pending.len();

        let mut embeddings = Vec::with_capacity(pending.len());
        for candidate in pending {
            let item = EmbeddableItem {
                owner_kind: candidate.owner_kind,
                owner_id: candidate.owner_id,
                text: candidate.text.clone(),
            };
            embeddings.push(self.service.embed_one(&item).await?);
        }

        let metrics = ExtractorMetrics::from_duration(embeddings.len(), skipped, start.elapsed());
        Ok((embeddings, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DeterministicEmbeddingProvider;
    use std::sync::Arc;

    fn service() -> EmbeddingService {
        EmbeddingService::new(Arc::new(DeterministicEmbeddingProvider::new(
            "krai-default-embed-v1",
            16,
        )))
    }

    #[tokio::test]
    async fn embeds_candidates_missing_current_model() {
        let service = service();
        let extractor = EmbeddingExtractor::new(&service);
        let candidates = vec![EmbeddingCandidate {
            owner_kind: OwnerKind::Chunk,
            owner_id: Uuid::new_v4(),
            text: "replace the fuser unit".to_string(),
            existing_model_names: vec![],
        }];
        let (embeddings, metrics) = extractor.extract(&candidates).await.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(metrics.items_rejected, 0);
    }

    #[tokio::test]
    async fn rerun_with_same_model_is_idempotent() {
        let service = service();
        let extractor = EmbeddingExtractor::new(&service);
        let candidates = vec![EmbeddingCandidate {
            owner_kind: OwnerKind::Chunk,
            owner_id: Uuid::new_v4(),
            text: "replace the fuser unit".to_string(),
            existing_model_names: vec!["krai-default-embed-v1".to_string()],
        }];
        let (embeddings, metrics) = extractor.extract(&candidates).await.unwrap();
        assert!(embeddings.is_empty());
        assert_eq!(metrics.items_rejected, 1);
    }

    #[tokio::test]
    async fn model_change_reembeds_previously_covered_items() {
        let service = EmbeddingService::new(Arc::new(DeterministicEmbeddingProvider::new(
            "krai-default-embed-v2",
            16,
        )));
        let extractor = EmbeddingExtractor::new(&service);
        let candidates = vec![EmbeddingCandidate {
            owner_kind: OwnerKind::Chunk,
            owner_id: Uuid::new_v4(),
            text: "replace the fuser unit".to_string(),
            existing_model_names: vec!["krai-default-embed-v1".to_string()],
        }];
        let (embeddings, _) = extractor.extract(&candidates).await.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].model_name, "krai-default-embed-v2");
    }
}
