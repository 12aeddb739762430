//! # Storage Abstraction
//!
//! Traits for the relational store (spec §4.3) and the content-addressed
//! blob store (spec §6). `krai-storage-sql` and `krai-storage-blob`
//! implement these against libSQL and redb respectively; `memory` ships
//! deterministic in-process implementations for tests.

pub mod backend;
pub mod blob;
pub mod circuit_breaker;
pub mod memory;

pub use backend::{DocumentPatch, EmbeddingMatch, EmbeddingSearchFilter, StorageBackend};
pub use blob::{BlobKey, BlobStore};
pub use memory::{InMemoryBlobStore, InMemoryStorageBackend};
