//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use semantic_cache_tier::cache::entry::{EntryId, EntryPayload};
use semantic_cache_tier::cache::error::StoreError;
use semantic_cache_tier::cache::exact::ExactMatchStore;
use semantic_cache_tier::cache::orchestrator::TieredCache;
use semantic_cache_tier::cache::semantic::{Neighbor, SemanticStore};
use semantic_cache_tier::config::Config;
use semantic_cache_tier::metrics::CacheMetrics;
use semantic_cache_tier::provider::{EmbeddingProvider, GenerationProvider, ProviderError};

pub const DIM: usize = 256;

/// Unit vector along `axis`.
pub fn axis(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis] = 1.0;
    v
}

/// Unit vector with cosine similarity `similarity` to `axis(0)`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = similarity;
    v[1] = (1.0 - similarity * similarity).sqrt();
    v
}

/// Embedder with an explicit text → vector table. Unknown texts get a fresh
/// orthogonal axis, so distinct prompts never match each other by accident.
pub struct KeyedEmbedder {
    table: Mutex<HashMap<String, Vec<f32>>>,
    next_axis: AtomicUsize,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl KeyedEmbedder {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            // Axes 0 and 1 are reserved for `at_similarity`.
            next_axis: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with(self, text: &str, vector: Vec<f32>) -> Self {
        self.table.lock().unwrap().insert(text.to_string(), vector);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeyedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::NotConfigured("embedding model not loaded".to_string()));
        }

        let mut table = self.table.lock().unwrap();
        let vector = table
            .entry(text.to_string())
            .or_insert_with(|| axis(self.next_axis.fetch_add(1, Ordering::SeqCst) % DIM))
            .clone();
        Ok(vector)
    }

    fn provider_name(&self) -> &'static str {
        "keyed"
    }
}

/// Generator returning scripted responses, or `Generated answer for: <prompt>`.
pub struct ScriptedGenerator {
    responses: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with(self, prompt: &str, response: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(prompt.to_string(), response.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        let scripted = self.responses.lock().unwrap().get(prompt).cloned();
        Ok(scripted.unwrap_or_else(|| format!("Generated answer for: {prompt}")))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Semantic store holding one entry whose reported distance is fixed.
pub struct FixedDistanceStore {
    pub distance: f64,
    pub payload: Mutex<EntryPayload>,
    pub refreshes: AtomicUsize,
    /// When set, refreshes report the entry as already evicted.
    pub gone_on_refresh: AtomicBool,
}

impl FixedDistanceStore {
    pub fn new(distance: f64, prompt: &str, response: &str) -> Self {
        Self {
            distance,
            payload: Mutex::new(EntryPayload::new(prompt, response, 1)),
            refreshes: AtomicUsize::new(0),
            gone_on_refresh: AtomicBool::new(false),
        }
    }

    pub fn evicted_before_refresh(self) -> Self {
        self.gone_on_refresh.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl SemanticStore for FixedDistanceStore {
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(1)
    }

    async fn nearest_neighbor(&self, _embedding: &[f32]) -> Result<Option<Neighbor>, StoreError> {
        Ok(Some(Neighbor {
            id: 1,
            distance: self.distance,
            payload: self.payload.lock().unwrap().clone(),
        }))
    }

    async fn insert(
        &self,
        _id: EntryId,
        _embedding: Vec<f32>,
        _payload: EntryPayload,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete_by_id(&self, _id: EntryId) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn update_payload(&self, _id: EntryId, payload: EntryPayload) -> Result<(), StoreError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.gone_on_refresh.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound(1));
        }
        *self.payload.lock().unwrap() = payload;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<(EntryId, EntryPayload)>, StoreError> {
        Ok(vec![(1, self.payload.lock().unwrap().clone())])
    }
}

/// Semantic store whose every call fails.
pub struct BrokenSemanticStore;

#[async_trait]
impl SemanticStore for BrokenSemanticStore {
    async fn count(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("vector db down".to_string()))
    }

    async fn nearest_neighbor(&self, _embedding: &[f32]) -> Result<Option<Neighbor>, StoreError> {
        Err(StoreError::Unavailable("vector db down".to_string()))
    }

    async fn insert(
        &self,
        _id: EntryId,
        _embedding: Vec<f32>,
        _payload: EntryPayload,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("vector db down".to_string()))
    }

    async fn delete_by_id(&self, _id: EntryId) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("vector db down".to_string()))
    }

    async fn update_payload(&self, _id: EntryId, _payload: EntryPayload) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("vector db down".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<(EntryId, EntryPayload)>, StoreError> {
        Err(StoreError::Unavailable("vector db down".to_string()))
    }
}

pub fn config(max_size: usize, threshold: f64) -> Config {
    let mut config = Config::default();
    config.cache.max_size = max_size;
    config.cache.similarity_threshold = threshold;
    config
}

pub fn build_cache(
    config: &Config,
    exact: Arc<dyn ExactMatchStore>,
    semantic: Arc<dyn SemanticStore>,
    embedder: Arc<KeyedEmbedder>,
    generator: Arc<ScriptedGenerator>,
) -> TieredCache {
    let metrics = Arc::new(CacheMetrics::new().unwrap());
    TieredCache::new(config, exact, semantic, embedder, generator, metrics)
}
