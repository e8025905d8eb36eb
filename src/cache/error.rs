//! Errors reported by the exact-match and semantic stores.

use thiserror::Error;

use crate::cache::entry::EntryId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed store response: {0}")]
    Malformed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Embedding is empty")]
    EmptyEmbedding,

    #[error("Entry {0} not found")]
    NotFound(EntryId),
}
