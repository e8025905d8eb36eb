//! Tier 2 storage: approximate nearest-neighbour store over (vector, payload).
//!
//! Distances follow the cosine-distance convention: 0 = identical direction,
//! 1 = orthogonal, 2 = opposite.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::cache::entry::{CacheEntry, EntryId, EntryPayload};
use crate::cache::error::StoreError;

/// Result of a nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub id: EntryId,
    pub distance: f64,
    pub payload: EntryPayload,
}

/// Vector store backing the semantic tier.
#[async_trait]
pub trait SemanticStore: Send + Sync {
    async fn count(&self) -> Result<usize, StoreError>;

    async fn nearest_neighbor(&self, embedding: &[f32]) -> Result<Option<Neighbor>, StoreError>;

    async fn insert(
        &self,
        id: EntryId,
        embedding: Vec<f32>,
        payload: EntryPayload,
    ) -> Result<(), StoreError>;

    /// Returns whether an entry was removed.
    async fn delete_by_id(&self, id: EntryId) -> Result<bool, StoreError>;

    async fn update_payload(&self, id: EntryId, payload: EntryPayload) -> Result<(), StoreError>;

    /// Every entry's id and payload. Only the eviction scan uses this.
    async fn list_all(&self) -> Result<Vec<(EntryId, EntryPayload)>, StoreError>;
}

/// Cosine distance between two vectors (`1 - cosine similarity`).
///
/// Returns `None` when the lengths differ or either vector has zero norm.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// In-process vector store using a linear cosine scan.
///
/// The first inserted vector fixes the dimensionality; later inserts and
/// queries with another length are rejected.
#[derive(Debug, Default)]
pub struct InMemorySemanticStore {
    entries: RwLock<HashMap<EntryId, CacheEntry>>,
}

impl InMemorySemanticStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
        StoreError::Unavailable(format!("semantic store lock poisoned: {e}"))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of stored vectors, if any are stored.
    pub fn dimension(&self) -> Option<usize> {
        self.entries
            .read()
            .ok()
            .and_then(|e| e.values().next().map(|entry| entry.embedding.len()))
    }

    /// Linear-scan nearest neighbour. Ties go to the lowest id; entries whose
    /// distance is not finite are skipped.
    pub fn nearest(&self, embedding: &[f32]) -> Result<Option<Neighbor>, StoreError> {
        if embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }

        let entries = self.entries.read().map_err(Self::poisoned)?;
        let mut best: Option<(f64, &CacheEntry)> = None;

        for entry in entries.values() {
            if entry.embedding.len() != embedding.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: entry.embedding.len(),
                    got: embedding.len(),
                });
            }
            let Some(distance) = cosine_distance(embedding, &entry.embedding)
                .filter(|d| d.is_finite())
            else {
                continue;
            };
            let closer = match best {
                None => true,
                Some((d, current)) => distance < d || (distance == d && entry.id < current.id),
            };
            if closer {
                best = Some((distance, entry));
            }
        }

        Ok(best.map(|(distance, entry)| Neighbor {
            id: entry.id,
            distance,
            payload: entry.payload.clone(),
        }))
    }

    /// Snapshot of every stored entry.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries
            .read()
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SemanticStore for InMemorySemanticStore {
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().map_err(Self::poisoned)?.len())
    }

    async fn nearest_neighbor(&self, embedding: &[f32]) -> Result<Option<Neighbor>, StoreError> {
        self.nearest(embedding)
    }

    async fn insert(
        &self,
        id: EntryId,
        embedding: Vec<f32>,
        payload: EntryPayload,
    ) -> Result<(), StoreError> {
        if embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(StoreError::Malformed(format!(
                "non-finite value in embedding for entry {id}"
            )));
        }

        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        if let Some(existing) = entries.values().next() {
            if existing.embedding.len() != embedding.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: existing.embedding.len(),
                    got: embedding.len(),
                });
            }
        }

        entries.insert(id, CacheEntry::new(id, embedding, payload));
        Ok(())
    }

    async fn delete_by_id(&self, id: EntryId) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        Ok(entries.remove(&id).is_some())
    }

    async fn update_payload(&self, id: EntryId, payload: EntryPayload) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.payload = payload;
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn list_all(&self) -> Result<Vec<(EntryId, EntryPayload)>, StoreError> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries
            .iter()
            .map(|(id, entry)| (*id, entry.payload.clone()))
            .collect())
    }
}
