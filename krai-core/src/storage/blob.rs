//! Content-addressed blob storage contract (spec §6): original files,
//! page images, and extracted artifacts, addressed by `(bucket, key)`.

use crate::error::Result;
use async_trait::async_trait;

/// Recognized buckets (spec §6). Not a closed Rust enum — adapters may
/// need to provision buckets the engine doesn't yet know about — but the
/// engine itself only ever writes to these four.
pub mod buckets {
    pub const DOCUMENTS: &str = "documents";
    pub const DOCUMENT_IMAGES: &str = "document-images";
    pub const ERROR_IMAGES: &str = "error-images";
    pub const PARTS_IMAGES: &str = "parts-images";
}

/// A `(bucket, key)` address for one blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub bucket: String,
    pub key: String,
}

impl BlobKey {
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// `sha256/<hash>/<filename>`, the key format for original uploads.
    #[must_use]
    pub fn original(sha256_hex: &str, filename: &str) -> Self {
        Self::new(buckets::DOCUMENTS, format!("sha256/{sha256_hex}/{filename}"))
    }

    /// `<document_id>/p<page>/<kind>.<ext>`, the key format for derived
    /// per-page artifacts (rasterized images, OCR overlays, etc.).
    #[must_use]
    pub fn derived(document_id: uuid::Uuid, page: u32, kind: &str, ext: &str, bucket: &str) -> Self {
        Self::new(bucket, format!("{document_id}/p{page}/{kind}.{ext}"))
    }
}

/// Content-addressed object storage for original files, page images, and
/// extracted artifacts. A `get` of a key that was never `put` (or was
/// deleted) fails with [`crate::error::Error::CorruptBlob`] rather than
/// returning `None` — in this engine a missing blob a caller expected to
/// exist is always a data-integrity problem, never a routine case.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &BlobKey, data: Vec<u8>) -> Result<()>;

    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>>;

    async fn exists(&self, key: &BlobKey) -> Result<bool>;

    async fn delete(&self, key: &BlobKey) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_key_format() {
        let key = BlobKey::original("abc123", "manual.pdf");
        assert_eq!(key.bucket, buckets::DOCUMENTS);
        assert_eq!(key.key, "sha256/abc123/manual.pdf");
    }

    #[test]
    fn derived_key_format() {
        let document_id = uuid::Uuid::nil();
        let key = BlobKey::derived(document_id, 450, "raster", "png", buckets::DOCUMENT_IMAGES);
        assert_eq!(key.key, format!("{document_id}/p450/raster.png"));
    }
}
