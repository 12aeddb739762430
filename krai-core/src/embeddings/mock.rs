//! Deterministic embedding provider for tests and offline development.
//!
//! Not wired to any real model; callers that need semantic fidelity must
//! configure a real `EmbeddingProvider` at the `krai-cli` layer.

use super::provider::{utils::normalize_vector, EmbeddingProvider};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct DeterministicEmbeddingProvider {
    model_name: String,
    dimension: usize,
}

impl DeterministicEmbeddingProvider {
    #[must_use]
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
        }
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            vector.push(((seed >> 16) as f32) / 32768.0 - 1.0);
        }
        normalize_vector(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_embed(text))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let provider = DeterministicEmbeddingProvider::new("test-model", 16);
        let a = provider.embed_text("E045 fuser error").await.unwrap();
        let b = provider.embed_text("E045 fuser error").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let provider = DeterministicEmbeddingProvider::new("test-model", 16);
        let a = provider.embed_text("E045 fuser error").await.unwrap();
        let b = provider.embed_text("paper jam at tray 2").await.unwrap();
        assert_ne!(a, b);
    }
}
