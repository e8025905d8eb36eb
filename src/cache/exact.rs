//! Tier 1: exact-match store keyed by literal prompt text.
//!
//! Keys are compared byte-for-byte; no case folding or whitespace trimming.
//! Size bounds, if any, are the backing store's business.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::cache::error::StoreError;

/// Literal `prompt → response` store.
#[async_trait]
pub trait ExactMatchStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Process-local exact-match store.
#[derive(Debug, Default)]
pub struct InMemoryExactStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryExactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored prompts.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExactMatchStore for InMemoryExactStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Unavailable(format!("exact store lock poisoned: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Unavailable(format!("exact store lock poisoned: {e}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Stand-in used when the configured backend could not be reached at startup.
/// Every call fails, so the orchestrator skips Tier 1 on each request.
#[derive(Debug, Clone)]
pub struct DisabledExactStore {
    reason: String,
}

impl DisabledExactStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ExactMatchStore for DisabledExactStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(feature = "redis")]
pub use redis_store::RedisExactStore;

#[cfg(feature = "redis")]
mod redis_store {
    use std::fmt;

    use async_trait::async_trait;
    use redis::aio::ConnectionManager;
    use redis::{AsyncCommands, Client};

    use super::ExactMatchStore;
    use crate::cache::error::StoreError;

    /// Redis-backed exact-match store. Plain GET/SET, no expiry.
    #[derive(Clone)]
    pub struct RedisExactStore {
        connection: ConnectionManager,
        key_prefix: Option<String>,
    }

    impl fmt::Debug for RedisExactStore {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RedisExactStore")
                .field("key_prefix", &self.key_prefix)
                .field("connection", &"<ConnectionManager>")
                .finish()
        }
    }

    impl RedisExactStore {
        /// Connect to Redis at `url` (e.g. "redis://127.0.0.1:6379").
        pub async fn connect(url: &str, key_prefix: Option<String>) -> Result<Self, StoreError> {
            let client = Client::open(url)
                .map_err(|e| StoreError::Unavailable(format!("invalid Redis URL {url}: {e}")))?;
            let connection = ConnectionManager::new(client)
                .await
                .map_err(|e| StoreError::Unavailable(format!("failed to connect to Redis: {e}")))?;
            Ok(Self {
                connection,
                key_prefix,
            })
        }

        fn prefix_key(&self, key: &str) -> String {
            match &self.key_prefix {
                Some(prefix) => format!("{prefix}:{key}"),
                None => key.to_string(),
            }
        }
    }

    #[async_trait]
    impl ExactMatchStore for RedisExactStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            let mut conn = self.connection.clone();
            conn.get(self.prefix_key(key))
                .await
                .map_err(|e| StoreError::Unavailable(format!("Redis GET failed: {e}")))
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            let mut conn = self.connection.clone();
            conn.set::<_, _, ()>(self.prefix_key(key), value)
                .await
                .map_err(|e| StoreError::Unavailable(format!("Redis SET failed: {e}")))
        }

        fn backend_name(&self) -> &'static str {
            "redis"
        }
    }
}
