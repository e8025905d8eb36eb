//! Tiered cache orchestrator: answers a prompt from the fastest tier that can.
//!
//! Per request:
//! 1. Tier 1 exact lookup on the literal prompt
//! 2. Tier 2 nearest-neighbour lookup; a hit is promoted into Tier 1 under the
//!    *current* prompt, so Tier 1 collects every paraphrase that matched
//! 3. On a total miss, generate, run admission, and write through to both tiers
//! 4. Record the outcome in the metrics sink
//!
//! Store and provider failures never fail the request. A failing tier is
//! skipped for that call; a failing generator yields [`GENERATION_FALLBACK`],
//! which is never cached.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::admission::AdmissionPolicy;
use crate::cache::entry::Tier;
use crate::cache::exact::ExactMatchStore;
use crate::cache::semantic::SemanticStore;
use crate::cache::semantic_tier::{SemanticHit, SemanticTier};
use crate::config::Config;
use crate::metrics::CacheMetrics;
use crate::provider::{EmbeddingProvider, GenerationProvider, ProviderError};

/// Returned to the caller when the generation provider fails.
pub const GENERATION_FALLBACK: &str =
    "Sorry, the generation service is unavailable right now. Please try again later.";

/// Outcome of [`TieredCache::handle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheResponse {
    pub response: String,
    pub from_cache: bool,
    pub tier: Option<Tier>,
    /// End-to-end latency in seconds.
    pub latency: f64,
    /// 1.0 for Tier 1, the computed value for Tier 2, absent for a miss.
    pub similarity: Option<f64>,
}

pub struct TieredCache {
    exact: Arc<dyn ExactMatchStore>,
    semantic: SemanticTier,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    admission: AdmissionPolicy,
    metrics: Arc<CacheMetrics>,
    generation_cost: f64,
    provider_timeout: Duration,
}

impl TieredCache {
    pub fn new(
        config: &Config,
        exact: Arc<dyn ExactMatchStore>,
        semantic: Arc<dyn SemanticStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            exact,
            semantic: SemanticTier::new(semantic, &config.cache),
            embedder,
            generator,
            admission: AdmissionPolicy::new(config.admission.clone()),
            metrics,
            generation_cost: config.cache.generation_cost_secs,
            provider_timeout: Duration::from_secs(config.cache.provider_timeout_secs),
        }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn semantic_tier(&self) -> &SemanticTier {
        &self.semantic
    }

    /// Answer a prompt from cache or the generator.
    pub async fn handle(&self, prompt: &str) -> CacheResponse {
        let start = Instant::now();

        if let Some(response) = self.lookup_exact(prompt).await {
            info!("T1 exact-match cache hit");
            return self.finish_hit(start, response, Tier::Exact, 1.0);
        }

        let mut embedding = None;
        if self.semantic_has_entries().await {
            match self.embed(prompt).await {
                Ok(vector) => {
                    if let Some(hit) = self.lookup_semantic(&vector).await {
                        if let Err(e) = self.exact.set(prompt, &hit.response).await {
                            warn!("Promotion to T1 failed: {e}");
                        }
                        info!(
                            similarity = hit.similarity,
                            entry_id = hit.id,
                            "T2 semantic cache hit"
                        );
                        return self.finish_hit(start, hit.response, Tier::Semantic, hit.similarity);
                    }
                    embedding = Some(vector);
                }
                Err(e) => warn!("Embedding failed, skipping T2 lookup: {e}"),
            }
        }

        debug!("T1 & T2 cache miss, calling generator");
        let response = match self.generate(prompt).await {
            Ok(text) => {
                self.admit(prompt, &text, embedding).await;
                text
            }
            Err(e) => {
                warn!("Generation failed: {e}");
                GENERATION_FALLBACK.to_string()
            }
        };

        self.metrics.record_miss();
        CacheResponse {
            response,
            from_cache: false,
            tier: None,
            latency: start.elapsed().as_secs_f64(),
            similarity: None,
        }
    }

    fn finish_hit(&self, start: Instant, response: String, tier: Tier, similarity: f64) -> CacheResponse {
        let latency = start.elapsed().as_secs_f64();
        self.metrics
            .record_hit(tier, (self.generation_cost - latency).max(0.0));
        CacheResponse {
            response,
            from_cache: true,
            tier: Some(tier),
            latency,
            similarity: Some(similarity),
        }
    }

    async fn lookup_exact(&self, prompt: &str) -> Option<String> {
        match self.exact.get(prompt).await {
            Ok(found) => found,
            Err(e) => {
                warn!(backend = self.exact.backend_name(), "T1 lookup failed, skipping tier: {e}");
                None
            }
        }
    }

    async fn semantic_has_entries(&self) -> bool {
        match self.semantic.count().await {
            Ok(count) => count > 0,
            Err(e) => {
                warn!("T2 count failed, skipping tier: {e}");
                false
            }
        }
    }

    async fn lookup_semantic(&self, embedding: &[f32]) -> Option<SemanticHit> {
        match self.semantic.lookup(embedding).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("T2 lookup failed, treating as miss: {e}");
                None
            }
        }
    }

    /// Write an admitted response through to both tiers.
    async fn admit(&self, prompt: &str, response: &str, embedding: Option<Vec<f32>>) {
        if let Err(reason) = self.admission.check(response) {
            debug!(%reason, "Response rejected by admission policy");
            self.metrics.record_admission_rejection();
            return;
        }

        if let Err(e) = self.exact.set(prompt, response).await {
            warn!("T1 write failed: {e}");
        }

        let embedding = match embedding {
            Some(v) => v,
            None => match self.embed(prompt).await {
                Ok(v) => v,
                Err(e) => {
                    warn!("Embedding failed, not adding to T2: {e}");
                    return;
                }
            },
        };

        match self.semantic.insert(prompt, response, embedding).await {
            Ok(outcome) => {
                if outcome.evicted.is_some() {
                    self.metrics.record_eviction();
                }
                info!(entry_id = outcome.id, "Cached new response");
            }
            Err(e) => warn!("T2 insert failed: {e}"),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let vector = self.call_provider(self.embedder.embed(text)).await?;
        let problem = if vector.is_empty() {
            Some("empty embedding")
        } else if vector.iter().any(|x| !x.is_finite()) {
            Some("non-finite embedding value")
        } else {
            None
        };
        if let Some(problem) = problem {
            self.metrics.record_provider_failure();
            return Err(ProviderError::InvalidResponse(problem.to_string()));
        }
        Ok(vector)
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.call_provider(self.generator.generate(prompt)).await
    }

    /// Run a provider call under the configured timeout. No lock is held here.
    async fn call_provider<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let result = match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.provider_timeout)),
        };
        if result.is_err() {
            self.metrics.record_provider_failure();
        }
        result
    }
}
