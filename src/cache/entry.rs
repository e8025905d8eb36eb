//! Cache entry types, tier definitions and the access clock.
//!
//! An entry is the unit stored in the semantic tier. The exact-match tier only
//! keeps `prompt → response` strings, so it never sees these types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identifies which cache tier served a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Tier 1: literal prompt text, byte-for-byte equality.
    Exact,
    /// Tier 2: nearest neighbour by embedding distance.
    Semantic,
}

impl Tier {
    /// Returns the numeric tier level reported to clients (lower = faster).
    pub fn level(&self) -> u8 {
        match self {
            Tier::Exact => 1,
            Tier::Semantic => 2,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Exact => write!(f, "T1-exact"),
            Tier::Semantic => write!(f, "T2-semantic"),
        }
    }
}

/// Unique identifier for a semantic-tier entry.
pub type EntryId = u64;

/// Monotonic id source. Ids are never reused, even after eviction.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate a new unique entry ID.
    pub fn allocate(&self) -> EntryId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Strictly increasing access timestamps in microseconds since the Unix epoch.
///
/// Two calls never return the same value: when the wall clock has not moved
/// (or moved backwards) the previous stamp is bumped by one microsecond. This
/// keeps LRU order identical to the order in which accesses happened.
#[derive(Debug, Default)]
pub struct AccessClock {
    last: AtomicU64,
}

impl AccessClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current access timestamp.
    pub fn now(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();

        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Metadata stored next to each vector in the semantic store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPayload {
    /// The prompt that was originally cached.
    pub prompt: String,

    /// The cached generation.
    pub response: String,

    /// Access timestamp from [`AccessClock`], refreshed on every semantic hit.
    pub last_accessed: u64,
}

impl EntryPayload {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>, last_accessed: u64) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            last_accessed,
        }
    }

    /// Record an access at the given timestamp.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed = now;
    }
}

/// A single semantic-tier entry: vector plus payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Unique identifier within the semantic tier.
    pub id: EntryId,

    /// Embedding of `payload.prompt`. Never empty.
    pub embedding: Vec<f32>,

    /// Prompt, response and access time.
    pub payload: EntryPayload,
}

impl CacheEntry {
    pub fn new(id: EntryId, embedding: Vec<f32>, payload: EntryPayload) -> Self {
        Self {
            id,
            embedding,
            payload,
        }
    }

    /// Original prompt this entry was cached under.
    pub fn key(&self) -> &str {
        &self.payload.prompt
    }

    pub fn response(&self) -> &str {
        &self.payload.response
    }

    pub fn last_accessed(&self) -> u64 {
        self.payload.last_accessed
    }
}
