//! Semantic tier coordinator.
//!
//! Wraps a [`SemanticStore`] with the similarity threshold, LRU refresh and
//! the capacity bound. Capacity-check + evict + insert, and every LRU refresh,
//! run under one mutex so the tier never grows past `max_size` and a refresh
//! is always visible to the next eviction scan. Nearest-neighbour reads are not
//! serialized. Callers compute embeddings before entering this type, so no
//! provider call is ever made while the mutex is held.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::entry::{AccessClock, EntryId, EntryPayload, IdAllocator};
use crate::cache::error::StoreError;
use crate::cache::evictor::Evictor;
use crate::cache::semantic::SemanticStore;
use crate::config::CacheConfig;

/// Slack allowed on reported distances before a neighbour is treated as malformed.
const SIMILARITY_TOLERANCE: f64 = 1e-6;

/// Convert a cosine distance into a similarity in `[-1, 1]`.
///
/// Non-finite values and values clearly outside the valid range are rejected;
/// rounding noise at the edges is clamped.
pub fn similarity_from_distance(distance: f64) -> Result<f64, StoreError> {
    if !distance.is_finite() {
        return Err(StoreError::Malformed(format!("non-finite distance {distance}")));
    }

    let similarity = 1.0 - distance;
    let range = (-1.0 - SIMILARITY_TOLERANCE)..=(1.0 + SIMILARITY_TOLERANCE);
    if !range.contains(&similarity) {
        return Err(StoreError::Malformed(format!(
            "distance {distance} gives similarity {similarity} outside [-1, 1]"
        )));
    }

    Ok(similarity.clamp(-1.0, 1.0))
}

/// A semantic hit that met the threshold.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub id: EntryId,
    /// Prompt the entry was originally cached under.
    pub cached_prompt: String,
    pub response: String,
    pub similarity: f64,
}

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: EntryId,
    /// Entry evicted to make room, if the tier was full.
    pub evicted: Option<EntryId>,
}

pub struct SemanticTier {
    store: Arc<dyn SemanticStore>,
    evictor: Evictor,
    ids: IdAllocator,
    clock: AccessClock,
    max_size: usize,
    threshold: f64,
    write_lock: Mutex<()>,
}

impl SemanticTier {
    pub fn new(store: Arc<dyn SemanticStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            evictor: Evictor::new(),
            ids: IdAllocator::new(),
            clock: AccessClock::new(),
            max_size: config.max_size,
            threshold: config.similarity_threshold,
            write_lock: Mutex::new(()),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.store.count().await
    }

    /// Find the nearest entry and, if it meets the threshold, refresh its
    /// access time and return it.
    pub async fn lookup(&self, embedding: &[f32]) -> Result<Option<SemanticHit>, StoreError> {
        let Some(neighbor) = self.store.nearest_neighbor(embedding).await? else {
            return Ok(None);
        };

        let similarity = similarity_from_distance(neighbor.distance)?;
        if similarity < self.threshold {
            debug!(
                similarity,
                threshold = self.threshold,
                entry_id = neighbor.id,
                "T2 semantic miss"
            );
            return Ok(None);
        }

        debug!(
            similarity,
            threshold = self.threshold,
            entry_id = neighbor.id,
            "T2 semantic hit"
        );

        let hit = SemanticHit {
            id: neighbor.id,
            cached_prompt: neighbor.payload.prompt.clone(),
            response: neighbor.payload.response.clone(),
            similarity,
        };
        self.refresh(neighbor.id, neighbor.payload).await;

        Ok(Some(hit))
    }

    /// Update `last_accessed` for a matched entry.
    async fn refresh(&self, id: EntryId, mut payload: EntryPayload) {
        let _guard = self.write_lock.lock().await;
        payload.touch(self.clock.now());

        match self.store.update_payload(id, payload).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!(entry_id = id, "Matched entry was evicted before its refresh");
            }
            Err(e) => warn!(entry_id = id, "LRU refresh failed: {e}"),
        }
    }

    /// Evict the least-recently-accessed entry if the tier is at capacity.
    pub async fn enforce_capacity(&self) -> Result<Option<EntryId>, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.evict_if_full().await
    }

    // Caller must hold `write_lock`.
    async fn evict_if_full(&self) -> Result<Option<EntryId>, StoreError> {
        let count = self.store.count().await?;
        if count < self.max_size {
            return Ok(None);
        }

        let entries = self.store.list_all().await?;
        let Some(victim) = self
            .evictor
            .select_victim(entries.iter().map(|(id, payload)| (*id, payload)))
        else {
            warn!(count, "Semantic store reports entries but listed none");
            return Ok(None);
        };

        self.store.delete_by_id(victim.entry_id).await?;
        info!(
            entry_id = victim.entry_id,
            last_accessed = victim.last_accessed,
            count,
            max_size = self.max_size,
            "Evicted LRU entry"
        );

        Ok(Some(victim.entry_id))
    }

    /// Insert a new entry, evicting first if the tier is full.
    pub async fn insert(
        &self,
        prompt: &str,
        response: &str,
        embedding: Vec<f32>,
    ) -> Result<InsertOutcome, StoreError> {
        if embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }

        let _guard = self.write_lock.lock().await;
        let evicted = self.evict_if_full().await?;

        let id = self.ids.allocate();
        let payload = EntryPayload::new(prompt, response, self.clock.now());
        self.store.insert(id, embedding, payload).await?;

        debug!(entry_id = id, "Added prompt to T2 semantic cache");
        Ok(InsertOutcome { id, evicted })
    }
}
