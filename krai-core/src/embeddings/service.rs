//! Turns extractable content (chunk text, image OCR/context text) into
//! [`Embedding`](crate::types::Embedding) rows, enforcing the dimension
//! invariant the embedding stage's contract depends on.

use super::provider::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::types::{Embedding, OwnerKind};
use std::sync::Arc;
use uuid::Uuid;

/// A piece of content awaiting an embedding: a chunk, image, or table.
#[derive(Debug, Clone)]
pub struct EmbeddableItem {
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub text: String,
}

/// Wraps an [`EmbeddingProvider`] and produces validated `Embedding` rows.
///
/// All embeddings produced by one service instance share `provider`'s
/// `model_name`/`embedding_dimension`; a provider that returns a vector of
/// the wrong length is a programming error in the provider, reported as
/// [`Error::EmbeddingDimensionMismatch`] rather than silently stored.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingService {
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.provider.embedding_dimension()
    }

    /// Embed one item, failing the stage if the provider's output doesn't
    /// match its own declared dimension.
    pub async fn embed_one(&self, item: &EmbeddableItem) -> Result<Embedding> {
        let vector = self
            .provider
            .embed_text(&item.text)
            .await
            .map_err(|source| Error::ExternalServiceUnavailable {
                service: self.provider.model_name().to_string(),
                reason: source.to_string(),
            })?;

        let expected = self.provider.embedding_dimension();
        if vector.len() != expected {
            return Err(Error::EmbeddingDimensionMismatch {
                configured: expected,
                actual: vector.len(),
            });
        }

        Ok(Embedding {
            id: Uuid::new_v4(),
            owner_kind: item.owner_kind,
            owner_id: item.owner_id,
            model_name: self.provider.model_name().to_string(),
            dimension: expected,
            vector,
        })
    }

    /// Embed a batch, stopping at the first dimension mismatch or provider
    /// error. Callers that want partial-batch tolerance should call
    /// `embed_one` per item instead.
    pub async fn embed_batch(&self, items: &[EmbeddableItem]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.embed_one(item).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::mock::DeterministicEmbeddingProvider;

    #[tokio::test]
    async fn embed_one_produces_consistent_dimension() {
        let service = EmbeddingService::new(Arc::new(DeterministicEmbeddingProvider::new(
            "krai-default-embed-v1",
            32,
        )));
        let item = EmbeddableItem {
            owner_kind: OwnerKind::Chunk,
            owner_id: Uuid::new_v4(),
            text: "replace the fuser unit".to_string(),
        };
        let embedding = service.embed_one(&item).await.unwrap();
        assert!(embedding.has_consistent_dimension());
        assert_eq!(embedding.model_name, "krai-default-embed-v1");
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let service = EmbeddingService::new(Arc::new(DeterministicEmbeddingProvider::new(
            "m",
            8,
        )));
        let items = vec![
            EmbeddableItem {
                owner_kind: OwnerKind::Chunk,
                owner_id: Uuid::new_v4(),
                text: "first".to_string(),
            },
            EmbeddableItem {
                owner_kind: OwnerKind::Image,
                owner_id: Uuid::new_v4(),
                text: "second".to_string(),
            },
        ];
        let embeddings = service.embed_batch(&items).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].owner_id, items[0].owner_id);
        assert_eq!(embeddings[1].owner_kind, OwnerKind::Image);
    }
}
