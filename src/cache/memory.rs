//! In-process cache store.
//!
//! Mirrors the Redis semantics the service relies on: blobs and sets live in
//! one keyspace, a type mismatch is an error, and expiry is lazy. Expiry uses
//! `tokio::time::Instant` so paused test clocks drive it.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{Batch, BatchOp, CacheStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Blob(Vec<u8>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Cache store backed by a map behind a single async lock.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (non-expired) keys, sorted.
    #[cfg(test)]
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn apply(entries: &mut HashMap<String, Entry>, op: BatchOp) -> StoreResult<()> {
        let now = Instant::now();
        if entries.get(op.key()).is_some_and(|e| e.is_expired(now)) {
            entries.remove(op.key());
        }

        match op {
            BatchOp::Set { key, value, ttl } => {
                entries.insert(
                    key,
                    Entry {
                        value: Value::Blob(value),
                        // An unrepresentable deadline never expires.
                        expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
                    },
                );
                Ok(())
            }
            BatchOp::Delete { key } => {
                entries.remove(&key);
                Ok(())
            }
            BatchOp::SetAdd { key, member } => {
                let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
                    value: Value::Set(BTreeSet::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Value::Set(members) => {
                        members.insert(member);
                        Ok(())
                    }
                    Value::Blob(_) => Err(StoreError::WrongType(key)),
                }
            }
        }
    }

    fn live<'a>(entries: &'a HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
        entries.get(key).filter(|e| !e.is_expired(Instant::now()))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        match Self::live(&entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Blob(bytes)) => Ok(Some(bytes.clone())),
            Some(Value::Set(_)) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        Self::apply(
            &mut entries,
            BatchOp::Set {
                key: key.to_string(),
                value,
                ttl,
            },
        )
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        Self::apply(&mut entries, BatchOp::Delete { key: key.to_string() })
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        Self::apply(
            &mut entries,
            BatchOp::SetAdd {
                key: key.to_string(),
                member: member.to_string(),
            },
        )
    }

    async fn members(&self, key: &str) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().await;
        match Self::live(&entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Value::Blob(_)) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn execute(&self, batch: Batch) -> Vec<StoreResult<()>> {
        let mut entries = self.entries.write().await;
        batch
            .into_ops()
            .into_iter()
            .map(|op| Self::apply(&mut entries, op))
            .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
