//! Link / Video Enricher (stage `enrichment`, spec §4.2.7). Discovers URLs
//! in page text, trims trailing punctuation artifacts, resolves redirects,
//! and fetches metadata from a pluggable [`MetadataProvider`] keyed by
//! [`ProviderKind`]. Rate-limited per provider; transient provider
//! failures are returned to the caller (the stage runner's retry policy
//! decides whether to try again), matching scenario S5.

use super::ExtractorMetrics;
use crate::error::{Error, Result};
use crate::types::{Link, Video, ValidationStatus, DEFAULT_ENRICHMENT_RATE_LIMIT_MS};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

static URL: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"https?://[^\s<>\[\]\(\)\"']+").expect("static regex"));

/// Which metadata backend a URL should be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    YouTube,
    Vimeo,
    Brightcove,
    Unknown,
}

impl ProviderKind {
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.contains("youtube.com") || lower.contains("youtu.be") {
            Self::YouTube
        } else if lower.contains("vimeo.com") {
            Self::Vimeo
        } else if lower.contains("brightcove.com") || lower.contains("bcove") {
            Self::Brightcove
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Vimeo => "vimeo",
            Self::Brightcove => "brightcove",
            Self::Unknown => "unknown",
        }
    }
}

/// Metadata a provider returns for one URL, already resolved past any
/// redirect chain.
#[derive(Debug, Clone)]
pub struct UrlMetadata {
    pub resolved_url: String,
    pub title: Option<String>,
    pub duration_secs: Option<u32>,
    pub is_video: bool,
}

/// Narrow interface to an external metadata/redirect-resolution backend,
/// mirroring [`crate::embeddings::EmbeddingProvider`]'s shape: one async
/// method per concern, injected by the caller.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch(&self, kind: ProviderKind, url: &str) -> Result<UrlMetadata>;
}

/// In-memory provider for tests and offline development: returns
/// preconfigured metadata per URL, optionally failing the first N calls
/// per URL with a transient error to exercise retry paths (scenario S5).
pub struct InMemoryMetadataProvider {
    responses: HashMap<String, UrlMetadata>,
    fail_first_n_calls: HashMap<String, u32>,
    call_counts: parking_lot::Mutex<HashMap<String, u32>>,
}

impl InMemoryMetadataProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fail_first_n_calls: HashMap::new(),
            call_counts: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_response(mut self, url: impl Into<String>, metadata: UrlMetadata) -> Self {
        self.responses.insert(url.into(), metadata);
        self
    }

    /// The next `n` calls for this URL fail with `ExternalServiceTimeout`
    /// before the configured response (or a broken-link default) is
    /// returned.
    #[must_use]
    pub fn failing_first(mut self, url: impl Into<String>, n: u32) -> Self {
        self.fail_first_n_calls.insert(url.into(), n);
        self
    }
}

impl Default for InMemoryMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for InMemoryMetadataProvider {
    async fn fetch(&self, kind: ProviderKind, url: &str) -> Result<UrlMetadata> {
        let mut counts = self.call_counts.lock();
        let count = counts.entry(url.to_string()).or_insert(0);
        *count += 1;
        let attempt = *count;
        drop(counts);

        if let Some(threshold) = self.fail_first_n_calls.get(url) {
            if attempt <= *threshold {
                return Err(Error::ExternalServiceTimeout {
                    service: kind.label().to_string(),
                });
            }
        }

        Ok(self.responses.get(url).cloned().unwrap_or(UrlMetadata {
            resolved_url: url.to_string(),
            title: None,
            duration_secs: None,
            is_video: false,
        }))
    }
}

impl Clone for UrlMetadata {
    fn clone(&self) -> Self {
        Self {
            resolved_url: self.resolved_url.clone(),
            title: self.title.clone(),
            duration_secs: self.duration_secs,
            is_video: self.is_video,
        }
    }
}

/// Lets the stage runner hold one `Arc<dyn MetadataProvider>` and
/// construct a fresh [`EnrichmentExtractor`] per invocation.
#[async_trait]
impl MetadataProvider for std::sync::Arc<dyn MetadataProvider> {
    async fn fetch(&self, kind: ProviderKind, url: &str) -> Result<UrlMetadata> {
        self.as_ref().fetch(kind, url).await
    }
}

/// oEmbed response fields this provider reads. Both YouTube's and
/// Vimeo's oEmbed endpoints return a superset of this; unrecognized
/// fields are ignored by `serde`.
#[derive(serde::Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    duration: Option<u32>,
}

/// Live [`MetadataProvider`] backed by `reqwest`: resolves a provider's
/// oEmbed endpoint for [`ProviderKind::YouTube`]/[`ProviderKind::Vimeo`],
/// and otherwise issues a plain `GET` and reports the URL the redirect
/// chain landed on (`reqwest` follows redirects by default).
/// [`ProviderKind::Brightcove`] has no public unauthenticated oEmbed
/// endpoint, so it is treated like [`ProviderKind::Unknown`].
pub struct HttpMetadataProvider {
    client: reqwest::Client,
}

impl HttpMetadataProvider {
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    fn to_error(kind: ProviderKind, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::ExternalServiceTimeout { service: kind.label().to_string() }
        } else {
            Error::ExternalServiceUnavailable {
                service: kind.label().to_string(),
                reason: err.to_string(),
            }
        }
    }

    async fn fetch_oembed(&self, kind: ProviderKind, endpoint: &str, url: &str) -> Result<UrlMetadata> {
        let response = self
            .client
            .get(endpoint)
            .query(&[("url", url), ("format", "json")])
            .send()
            .await
            .map_err(|e| Self::to_error(kind, e))?;
        let resolved_url = response.url().to_string();
        if !response.status().is_success() {
            // A 404/unembeddable response still means the link itself
            // resolves; fall back to a plain link with no metadata.
            return Ok(UrlMetadata { resolved_url, title: None, duration_secs: None, is_video: true });
        }
        let body: OEmbedResponse = response.json().await.map_err(|e| Self::to_error(kind, e))?;
        Ok(UrlMetadata {
            resolved_url,
            title: body.title,
            duration_secs: body.duration,
            is_video: true,
        })
    }

    async fn fetch_generic(&self, kind: ProviderKind, url: &str) -> Result<UrlMetadata> {
        let response = self.client.get(url).send().await.map_err(|e| Self::to_error(kind, e))?;
        Ok(UrlMetadata {
            resolved_url: response.url().to_string(),
            title: None,
            duration_secs: None,
            is_video: false,
        })
    }
}

impl Default for HttpMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn fetch(&self, kind: ProviderKind, url: &str) -> Result<UrlMetadata> {
        match kind {
            ProviderKind::YouTube => self.fetch_oembed(kind, "https://www.youtube.com/oembed", url).await,
            ProviderKind::Vimeo => self.fetch_oembed(kind, "https://vimeo.com/api/oembed.json", url).await,
            ProviderKind::Brightcove | ProviderKind::Unknown => self.fetch_generic(kind, url).await,
        }
    }
}

pub struct EnrichmentExtractor<P: MetadataProvider> {
    provider: P,
    rate_limit: Duration,
}

impl<P: MetadataProvider> EnrichmentExtractor<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            rate_limit: Duration::from_millis(DEFAULT_ENRICHMENT_RATE_LIMIT_MS),
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Discover URLs across all pages of a document and resolve/fetch
    /// metadata for each, spacing calls to the same provider kind at
    /// least `rate_limit` apart. A single URL's failure after retries are
    /// exhausted (the stage runner's responsibility) is surfaced to the
    /// caller and aborts the remaining URLs for this call — the runner
    /// re-invokes the stage on retry, which is cheap because enrichment
    /// is per-URL idempotent.
    pub async fn extract(
        &self,
        document_id: Uuid,
        pages: &[(u32, String)],
    ) -> Result<(Vec<Link>, Vec<Video>, ExtractorMetrics)> {
        let start = Instant::now();
        let urls = discover_urls(pages);
        let mut links = Vec::new();
        let mut videos = Vec::new();
        let mut last_call: HashMap<ProviderKind, Instant> = HashMap::new();
        let mut rejected = 0usize;

        for url in &urls {
            let kind = ProviderKind::for_url(url);
            if let Some(last) = last_call.get(&kind) {
                let elapsed = last.elapsed();
                if elapsed < self.rate_limit {
                    tokio::time::sleep(self.rate_limit - elapsed).await;
                }
            }
            last_call.insert(kind, Instant::now());

            match self.provider.fetch(kind, url).await {
                Ok(metadata) => {
                    if metadata.is_video {
                        videos.push(Video {
                            id: Uuid::new_v4(),
                            document_id,
                            url: metadata.resolved_url,
                            title: metadata.title,
                            duration_secs: metadata.duration_secs,
                            validation_status: ValidationStatus::Ok,
                        });
                    } else {
                        let validation_status = if metadata.resolved_url == *url {
                            ValidationStatus::Ok
                        } else {
                            ValidationStatus::Redirected
                        };
                        links.push(Link {
                            id: Uuid::new_v4(),
                            document_id,
                            url: metadata.resolved_url,
                            link_type: kind.label().to_string(),
                            validation_status,
                        });
                    }
                }
                Err(err) if err.is_recoverable() => return Err(err),
                Err(_) => {
                    rejected += 1;
                    links.push(Link {
                        id: Uuid::new_v4(),
                        document_id,
                        url: url.clone(),
                        link_type: kind.label().to_string(),
                        validation_status: ValidationStatus::Broken,
                    });
                }
            }
        }

        let metrics =
            ExtractorMetrics::from_duration(links.len() + videos.len(), rejected, start.elapsed());
        Ok((links, videos, metrics))
    }
}

/// Finds URL-shaped substrings and trims trailing punctuation that is
/// almost always sentence/list-boundary noise rather than part of the
/// URL (`.`, `,`, `)`, `;`, `:`).
fn discover_urls(pages: &[(u32, String)]) -> Vec<String> {
    let mut urls = Vec::new();
    for (_, text) in pages {
        for m in URL.find_iter(text) {
            let trimmed = m.as_str().trim_end_matches(['.', ',', ')', ';', ':']);
            if !trimmed.is_empty() {
                urls.push(trimmed.to_string());
            }
        }
    }
    urls.sort();
    urls.dedup();
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_and_trims_urls() {
        let pages = vec![(
            1,
            "See https://www.youtube.com/watch?v=abc123. Also (https://vimeo.com/42).".to_string(),
        )];
        let urls = discover_urls(&pages);
        assert_eq!(
            urls,
            vec![
                "https://vimeo.com/42".to_string(),
                "https://www.youtube.com/watch?v=abc123".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn fetches_metadata_for_discovered_links() {
        let provider = InMemoryMetadataProvider::new().with_response(
            "https://vimeo.com/42",
            UrlMetadata {
                resolved_url: "https://vimeo.com/42".to_string(),
                title: Some("Fuser replacement".to_string()),
                duration_secs: Some(120),
                is_video: true,
            },
        );
        let extractor = EnrichmentExtractor::new(provider).with_rate_limit(Duration::ZERO);
        let document_id = Uuid::new_v4();
        let pages = vec![(1, "Watch: https://vimeo.com/42".to_string())];
        let (links, videos, _) = extractor.extract(document_id, &pages).await.unwrap();
        assert!(links.is_empty());
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].validation_status, ValidationStatus::Ok);
        assert_eq!(videos[0].title.as_deref(), Some("Fuser replacement"));
    }

    #[tokio::test]
    async fn transient_failure_is_returned_for_the_runner_to_retry() {
        let provider = InMemoryMetadataProvider::new().failing_first("https://vimeo.com/42", 1);
        let extractor = EnrichmentExtractor::new(provider).with_rate_limit(Duration::ZERO);
        let document_id = Uuid::new_v4();
        let pages = vec![(1, "https://vimeo.com/42".to_string())];

        let first = extractor.extract(document_id, &pages).await;
        assert!(matches!(first, Err(Error::ExternalServiceTimeout { .. })));

        let second = extractor.extract(document_id, &pages).await.unwrap();
        assert_eq!(second.0.len() + second.1.len(), 1);
    }

    #[tokio::test]
    async fn non_recoverable_provider_error_marks_link_broken() {
        struct AlwaysBroken;
        #[async_trait]
        impl MetadataProvider for AlwaysBroken {
            async fn fetch(&self, _kind: ProviderKind, _url: &str) -> Result<UrlMetadata> {
                Err(Error::ValidationError("malformed response".to_string()))
            }
        }
        let extractor = EnrichmentExtractor::new(AlwaysBroken).with_rate_limit(Duration::ZERO);
        let document_id = Uuid::new_v4();
        let pages = vec![(1, "https://example.com/manual".to_string())];
        let (links, _, metrics) = extractor.extract(document_id, &pages).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].validation_status, ValidationStatus::Broken);
        assert_eq!(metrics.items_rejected, 1);
    }
}
