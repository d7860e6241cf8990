//! Key-value cache store shared by the sync job and the vehicle read path.
//!
//! Values are raw serialized blobs; index sets hold vehicle ids as members.
//! A [`Batch`] is queued locally and flushed in one round trip. Batches are
//! not transactional: every operation reports its own result.

pub mod keys;
mod memory;
mod redis_store;

pub use memory::MemoryCacheStore;
pub use redis_store::RedisCacheStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CacheConfig;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Could not reach the cache backend
    #[error("cache connection error: {0}")]
    Connection(String),

    /// Operation against a key holding the wrong kind of value
    #[error("wrong value type at key '{0}'")]
    WrongType(String),

    /// Any other backend failure
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One queued write in a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Option<Duration>,
    },
    Delete {
        key: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
}

impl BatchOp {
    /// The key this operation writes.
    pub fn key(&self) -> &str {
        match self {
            BatchOp::Set { key, .. } | BatchOp::Delete { key } | BatchOp::SetAdd { key, .. } => key,
        }
    }

    /// Command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BatchOp::Set { .. } => "SET",
            BatchOp::Delete { .. } => "DEL",
            BatchOp::SetAdd { .. } => "SADD",
        }
    }
}

/// An ordered list of writes flushed together by [`CacheStore::execute`].
#[derive(Debug, Default, Clone)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.push(BatchOp::Set {
            key: key.into(),
            value,
            ttl: None,
        })
    }

    pub fn set_with_ttl(&mut self, key: impl Into<String>, value: Vec<u8>, ttl: Duration) -> &mut Self {
        self.push(BatchOp::Set {
            key: key.into(),
            value,
            ttl: Some(ttl),
        })
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(BatchOp::Delete { key: key.into() })
    }

    pub fn set_add(&mut self, key: impl Into<String>, member: impl ToString) -> &mut Self {
        self.push(BatchOp::SetAdd {
            key: key.into(),
            member: member.to_string(),
        })
    }

    fn push(&mut self, op: BatchOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Async key-value store with set membership, optional TTL, and batched writes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` on a miss or an expired key.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Full replace of the value at `key`. `ttl: None` clears any previous expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Removes `key`. Succeeds when the key is absent.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Members of the set at `key`; empty when absent.
    async fn members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Flush `batch` in one round trip. Returns one result per operation, in order.
    async fn execute(&self, batch: Batch) -> Vec<StoreResult<()>>;

    async fn ping(&self) -> StoreResult<()>;

    fn provider_name(&self) -> &'static str;
}

/// Connect the store selected by the connection string scheme.
pub async fn connect(config: &CacheConfig) -> StoreResult<Arc<dyn CacheStore>> {
    if config.connection_string.starts_with("memory://") {
        tracing::info!("Using in-process vehicle cache store");
        return Ok(Arc::new(MemoryCacheStore::new()));
    }

    let store = RedisCacheStore::connect(&config.connection_string).await?;
    store.ping().await?;
    Ok(Arc::new(store))
}
