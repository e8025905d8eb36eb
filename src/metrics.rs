//! Metrics sink for cache outcomes.
//!
//! Counters live in a private Prometheus registry owned by [`CacheMetrics`];
//! there is no process-global state, so each test or server instance gets its
//! own independent counters. Every update is a single atomic operation.

use prometheus::{Counter, Encoder, IntCounter, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::cache::entry::Tier;

const NAMESPACE: &str = "semantic_cache";

/// The counters returned by the metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_requests: u64,
    /// Estimated seconds of generation time avoided.
    pub total_latency_saved: f64,
}

impl MetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.total_requests as f64
    }
}

pub struct CacheMetrics {
    registry: Registry,
    total_requests: IntCounter,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    total_latency_saved: Counter,
    tier1_hits: IntCounter,
    tier2_hits: IntCounter,
    evictions: IntCounter,
    admission_rejections: IntCounter,
    provider_failures: IntCounter,
}

impl std::fmt::Debug for CacheMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn int_counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl CacheMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let total_latency_saved = Counter::with_opts(
            Opts::new(
                "total_latency_saved_seconds",
                "Estimated generation time avoided by cache hits",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(total_latency_saved.clone()))?;

        Ok(Self {
            total_requests: int_counter(&registry, "total_requests", "Prompts handled")?,
            cache_hits: int_counter(&registry, "cache_hits", "Prompts served from either tier")?,
            cache_misses: int_counter(&registry, "cache_misses", "Prompts that reached the generator")?,
            tier1_hits: int_counter(&registry, "tier1_hits", "Exact-match hits")?,
            tier2_hits: int_counter(&registry, "tier2_hits", "Semantic hits")?,
            evictions: int_counter(&registry, "evictions", "Semantic entries evicted by LRU")?,
            admission_rejections: int_counter(
                &registry,
                "admission_rejections",
                "Generated responses refused by the admission policy",
            )?,
            provider_failures: int_counter(
                &registry,
                "provider_failures",
                "Embedding or generation calls that failed or timed out",
            )?,
            total_latency_saved,
            registry,
        })
    }

    /// Record a hit. Negative savings are floored at zero.
    pub fn record_hit(&self, tier: Tier, latency_saved: f64) {
        self.total_requests.inc();
        self.cache_hits.inc();
        match tier {
            Tier::Exact => self.tier1_hits.inc(),
            Tier::Semantic => self.tier2_hits.inc(),
        }
        if latency_saved.is_finite() && latency_saved > 0.0 {
            self.total_latency_saved.inc_by(latency_saved);
        }
    }

    pub fn record_miss(&self) {
        self.total_requests.inc();
        self.cache_misses.inc();
    }

    pub fn record_eviction(&self) {
        self.evictions.inc();
    }

    pub fn record_admission_rejection(&self) {
        self.admission_rejections.inc();
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.inc();
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.get()
    }

    pub fn admission_rejections(&self) -> u64 {
        self.admission_rejections.get()
    }

    pub fn provider_failures(&self) -> u64 {
        self.provider_failures.get()
    }

    pub fn tier_hits(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Exact => self.tier1_hits.get(),
            Tier::Semantic => self.tier2_hits.get(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            total_requests: self.total_requests.get(),
            total_latency_saved: self.total_latency_saved.get(),
        }
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn encode_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
