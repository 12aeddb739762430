//! Text Extractor (stage `text_extraction`, spec §4.2.1).

use super::ExtractorMetrics;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Instant;

/// Narrow interface over whatever PDF library actually turns bytes into
/// per-page text. `krai-core` has no hard dependency on one; `krai-cli`
/// injects a real implementation, tests use [`InMemoryPdfBackend`].
#[async_trait]
pub trait PdfTextBackend: Send + Sync {
    /// Returns one string per page in reading order. An empty page is a
    /// valid result (scanned page with no text layer); an `Err` means the
    /// blob itself could not be opened (corrupt/encrypted).
    async fn extract_pages(&self, blob: &[u8]) -> anyhow::Result<Vec<String>>;
}

/// Ordered page texts plus the detected language and page count, spec
/// §4.2.1's output shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TextExtractionOutput {
    pub pages: Vec<(u32, String)>,
    pub language: Option<String>,
    pub page_count: u32,
    /// Pages that the backend reported (non-fatally) as unreadable;
    /// "partial pages are allowed and reported" per spec.
    pub partial_pages: Vec<u32>,
}

pub struct TextExtractor<B: PdfTextBackend> {
    backend: B,
}

impl<B: PdfTextBackend> TextExtractor<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Extract text from every page of a document blob.
    ///
    /// # Errors
    /// Returns [`Error::TextExtractionFailure`] when the backend cannot
    /// open the blob at all (corrupt/encrypted input).
    pub async fn extract(
        &self,
        blob: &[u8],
    ) -> Result<(TextExtractionOutput, ExtractorMetrics)> {
        let start = Instant::now();
        let raw_pages = self
            .backend
            .extract_pages(blob)
            .await
            .map_err(|e| Error::TextExtractionFailure(e.to_string()))?;

        let mut pages = Vec::with_capacity(raw_pages.len());
        let mut partial_pages = Vec::new();
        for (idx, text) in raw_pages.iter().enumerate() {
            let page_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            if text.trim().is_empty() {
                partial_pages.push(page_number);
            }
            pages.push((page_number, text.clone()));
        }

        let language = detect_language(&pages);
        let page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        let output = TextExtractionOutput {
            pages,
            language,
            page_count,
            partial_pages: partial_pages.clone(),
        };

        let metrics = ExtractorMetrics::from_duration(
            output.pages.len(),
            partial_pages.len(),
            start.elapsed(),
        );
        Ok((output, metrics))
    }
}

/// Very small heuristic language detector: counts stopword hits for a
/// short fixed list of languages and returns the best match. Real
/// language identification is out of scope for the core engine; this is
/// only precise enough to satisfy `classification`'s "detected language"
/// input and is deliberately not a general-purpose model.
fn detect_language(pages: &[(u32, String)]) -> Option<String> {
    const STOPWORDS: &[(&str, &[&str])] = &[
        ("en", &[" the ", " and ", " is ", " to ", " of "]),
        ("de", &[" der ", " die ", " und ", " ist ", " das "]),
        ("fr", &[" le ", " la ", " et ", " est ", " des "]),
        ("es", &[" el ", " la ", " y ", " es ", " de "]),
    ];
    let sample: String = pages
        .iter()
        .take(5)
        .map(|(_, text)| text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if sample.trim().is_empty() {
        return None;
    }
    let padded = format!(" {sample} ");
    STOPWORDS
        .iter()
        .map(|(lang, words)| {
            let score = words.iter().filter(|w| padded.contains(*w)).count();
            (*lang, score)
        })
        .max_by_key(|(_, score)| *score)
        .filter(|(_, score)| *score > 0)
        .map(|(lang, _)| lang.to_string())
}

/// Lets the stage runner hold one `Arc<dyn PdfTextBackend>` and construct
/// a fresh [`TextExtractor`] per invocation without cloning the backend
/// itself.
#[async_trait]
impl PdfTextBackend for std::sync::Arc<dyn PdfTextBackend> {
    async fn extract_pages(&self, blob: &[u8]) -> anyhow::Result<Vec<String>> {
        self.as_ref().extract_pages(blob).await
    }
}

/// Deterministic in-memory backend for tests and offline development.
/// Splits the blob on form-feed (`\x0C`) bytes, the conventional
/// plain-text stand-in for a page break, treating the whole blob as a
/// single page when no form-feed is present.
pub struct InMemoryPdfBackend;

#[async_trait]
impl PdfTextBackend for InMemoryPdfBackend {
    async fn extract_pages(&self, blob: &[u8]) -> anyhow::Result<Vec<String>> {
        if blob.is_empty() {
            anyhow::bail!("empty blob");
        }
        let text = String::from_utf8(blob.to_vec())
            .map_err(|e| anyhow::anyhow!("blob is not valid utf-8 text: {e}"))?;
        Ok(text.split('\u{000C}').map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_on_form_feed_into_pages() {
        let extractor = TextExtractor::new(InMemoryPdfBackend);
        let blob = "page one\u{000C}page two\u{000C}page three".as_bytes();
        let (output, metrics) = extractor.extract(blob).await.unwrap();
        assert_eq!(output.page_count, 3);
        assert_eq!(output.pages[1].1, "page two");
        assert_eq!(metrics.items_emitted, 3);
    }

    #[tokio::test]
    async fn corrupt_blob_is_a_failure() {
        let extractor = TextExtractor::new(InMemoryPdfBackend);
        let err = extractor.extract(&[]).await.unwrap_err();
        assert!(matches!(err, Error::TextExtractionFailure(_)));
    }

    #[tokio::test]
    async fn blank_pages_are_reported_as_partial_not_fatal() {
        let extractor = TextExtractor::new(InMemoryPdfBackend);
        let blob = "has text\u{000C}   \u{000C}more text".as_bytes();
        let (output, _) = extractor.extract(blob).await.unwrap();
        assert_eq!(output.partial_pages, vec![2]);
    }

    #[test]
    fn detect_language_prefers_majority_stopwords() {
        let pages = vec![(1, "the quick brown fox and the lazy dog is here".to_string())];
        assert_eq!(detect_language(&pages), Some("en".to_string()));
    }
}
