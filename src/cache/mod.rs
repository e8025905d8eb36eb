//! Tiered prompt cache.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`entry`]: CacheEntry, Tier, id allocation and the access clock
//! - [`exact`]: Tier 1 exact-match stores
//! - [`semantic`]: Tier 2 vector stores
//! - [`semantic_tier`]: threshold decision, LRU refresh and capacity bound for Tier 2
//! - [`admission`]: which responses are worth caching
//! - [`evictor`]: least-recently-used victim selection
//! - [`orchestrator`]: the per-request lookup/promotion/admission protocol

pub mod admission;
pub mod entry;
pub mod error;
pub mod evictor;
pub mod exact;
pub mod orchestrator;
pub mod semantic;
pub mod semantic_tier;
