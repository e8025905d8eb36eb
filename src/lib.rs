//! semantic-cache-tier: tiered prompt cache for LLM completions.
//!
//! Answers repeated or paraphrased prompts without calling the model:
//!   exact-match tier (literal prompt) → semantic tier (embedding similarity) → generator
//!
//! Exposes a small HTTP API for prompt processing and cache metrics.

pub mod cache;
pub mod config;
pub mod metrics;
pub mod provider;
pub mod server;
