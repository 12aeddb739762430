//! # Embeddings
//!
//! Vector embeddings for chunks, images, and tables, and the cosine-similarity
//! math the search index and enrichment stages build on.
//!
//! The embedding stage (spec §4.2.8) asks an [`EmbeddingProvider`] to turn
//! extractable text into a fixed-length vector and stores the result through
//! [`EmbeddingService`], which enforces that every vector matches the
//! provider's declared dimension before it reaches storage.

mod mock;
mod provider;
mod service;
mod similarity;

pub use mock::DeterministicEmbeddingProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult};
pub use service::{EmbeddableItem, EmbeddingService};
pub use similarity::{cosine_similarity, euclidean_distance, SimilarityPrecision};
