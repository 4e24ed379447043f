//! High level fetcher orchestration.
//!
//! Wires the identity pool, profile selector, protection classifier, and
//! escalation engine into an ergonomic entry point for single and batch
//! fetches. The fetcher performs live I/O only: caching by request
//! fingerprint and HTML-to-text extraction belong to collaborators behind
//! the seams exposed here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::batch::{self, BatchResult};
use crate::engine::{
    EscalationEngine, FetchOptions, FetchOutcome, FetchResult, ReqwestTransport, Transport,
};
use crate::protection::{ProtectionClassifier, ProtectionSignature, SignatureError};
use crate::stealth::{IdentityPool, ProfileSelector, StealthTier};

/// Result alias used across the orchestration layer.
pub type StealthFetchResult<T> = Result<T, FetchError>;

/// High-level error surfaced by the fetcher.
///
/// Blocked pages and unreachable hosts are *not* errors: they are terminal
/// [`FetchResult`] outcomes with full attempt histories. Errors here mean the
/// request never became an escalation run at all.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("signature configuration invalid: {0}")]
    Signature(#[from] SignatureError),
    #[error("fetch task failed: {0}")]
    TaskFailure(String),
    #[error("content extraction failed: {0}")]
    Extraction(String),
}

/// Collaborator that turns a fetched body into text/markdown.
///
/// The engine never parses HTML itself; on success it hands the raw bytes and
/// declared content type to whatever implementation the caller plugs in.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(
        &self,
        body: &Bytes,
        content_type: Option<&str>,
    ) -> Result<String, FetchError>;
}

/// Fetcher configuration used by the builder.
#[derive(Clone)]
pub struct StealthFetcherConfig {
    /// Starting tier for every fetch unless overridden per call.
    pub tier: StealthTier,
    /// Whether blocked verdicts escalate automatically.
    pub auto_bypass: bool,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Worker cap for batch fetches.
    pub concurrency: usize,
    /// Fixed RNG seed for reproducible identity selection.
    pub seed: Option<u64>,
}

impl Default for StealthFetcherConfig {
    fn default() -> Self {
        Self {
            tier: StealthTier::Off,
            auto_bypass: true,
            timeout: Duration::from_secs(30),
            concurrency: 4,
            seed: None,
        }
    }
}

/// Fluent builder for [`StealthFetcher`].
pub struct StealthFetcherBuilder {
    config: StealthFetcherConfig,
    extra_signatures: Vec<ProtectionSignature>,
    transport: Option<Arc<dyn Transport>>,
    extractor: Option<Arc<dyn ContentExtractor>>,
}

impl StealthFetcherBuilder {
    pub fn new() -> Self {
        Self {
            config: StealthFetcherConfig::default(),
            extra_signatures: Vec::new(),
            transport: None,
            extractor: None,
        }
    }

    pub fn with_tier(mut self, tier: StealthTier) -> Self {
        self.config.tier = tier;
        self
    }

    pub fn with_auto_bypass(mut self, enabled: bool) -> Self {
        self.config.auto_bypass = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.config.concurrency = limit.max(1);
        self
    }

    /// Seed the identity pool for deterministic selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Merge additional protection signatures from a JSON array.
    pub fn with_signatures_json(mut self, json: &str) -> StealthFetchResult<Self> {
        let mut parsed = crate::protection::signatures_from_json(json)?;
        self.extra_signatures.append(&mut parsed);
        Ok(self)
    }

    /// Replace the network transport (tests use a scripted implementation).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> StealthFetcher {
        let pool = match self.config.seed {
            Some(seed) => IdentityPool::with_seed(seed),
            None => IdentityPool::new(),
        };
        let selector = ProfileSelector::new(Arc::new(pool));
        let classifier = Arc::new(ProtectionClassifier::with_signatures(self.extra_signatures));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let engine = Arc::new(EscalationEngine::new(transport, classifier, selector));

        StealthFetcher {
            config: self.config,
            engine,
            extractor: self.extractor,
        }
    }
}

impl Default for StealthFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Main fetch orchestrator.
pub struct StealthFetcher {
    config: StealthFetcherConfig,
    engine: Arc<EscalationEngine>,
    extractor: Option<Arc<dyn ContentExtractor>>,
}

impl StealthFetcher {
    /// Fetcher with default configuration.
    pub fn new() -> Self {
        StealthFetcherBuilder::new().build()
    }

    /// Obtain a builder to customise the fetcher.
    pub fn builder() -> StealthFetcherBuilder {
        StealthFetcherBuilder::new()
    }

    pub fn config(&self) -> &StealthFetcherConfig {
        &self.config
    }

    fn default_options(&self) -> FetchOptions {
        FetchOptions {
            tier: self.config.tier,
            auto_bypass: self.config.auto_bypass,
            timeout: self.config.timeout,
        }
    }

    /// Fetch one URL with the configured defaults.
    pub async fn fetch(&self, url: &str) -> StealthFetchResult<FetchResult> {
        let options = self.default_options();
        self.fetch_with(url, &options).await
    }

    /// Fetch one URL with explicit options.
    pub async fn fetch_with(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> StealthFetchResult<FetchResult> {
        let url = batch::parse_fetch_url(url)?;
        let mut result = self.engine.run(url, options).await;

        if result.outcome == FetchOutcome::Success
            && let Some(ref extractor) = self.extractor
            && let Some(ref body) = result.body
        {
            match extractor
                .extract(body, result.content_type.as_deref())
                .await
            {
                Ok(text) => result.extracted = Some(text),
                // The page itself was fetched; a failing extractor does not
                // retroactively fail the fetch.
                Err(err) => log::warn!("extraction failed for {}: {err}", result.url),
            }
        }

        Ok(result)
    }

    /// Fetch a list of URLs with the configured defaults and concurrency cap.
    pub async fn fetch_batch(&self, urls: &[String]) -> StealthFetchResult<BatchResult> {
        let options = self.default_options();
        self.fetch_batch_with(urls, &options, self.config.concurrency)
            .await
    }

    /// Fetch a list of URLs with explicit options and worker cap.
    pub async fn fetch_batch_with(
        &self,
        urls: &[String],
        options: &FetchOptions,
        concurrency: usize,
    ) -> StealthFetchResult<BatchResult> {
        batch::run_batch(Arc::clone(&self.engine), urls, options, concurrency).await
    }
}

impl Default for StealthFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_concurrency() {
        let fetcher = StealthFetcher::builder().with_concurrency(0).build();
        assert_eq!(fetcher.config().concurrency, 1);
    }

    #[test]
    fn builder_rejects_bad_signature_json() {
        let result = StealthFetcher::builder().with_signatures_json("not json");
        assert!(matches!(result, Err(FetchError::Signature(_))));
    }

    #[tokio::test]
    async fn fetch_rejects_malformed_url_before_io() {
        let fetcher = StealthFetcher::builder().with_seed(1).build();
        let err = fetcher.fetch("::not-a-url::").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidInput(_)));
    }
}
