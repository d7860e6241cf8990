//! Redis cache store.
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections with
//! automatic reconnection. Batches go out as one non-atomic pipeline.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::{RedisError, Value};
use tracing::debug;

use super::{Batch, BatchOp, CacheStore, StoreError, StoreResult};

/// Redis-backed cache store.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection_manager: ConnectionManager,
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheStore {
    /// Open a managed connection to the server at `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            StoreError::Connection(format!("invalid Redis connection string: {}", e))
        })?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("failed to connect to Redis: {}", e)))?;

        tracing::info!(url = %redact_url(url), "Redis cache store connected");

        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_error("GET", e))?;

        debug!(key, hit = value.is_some(), "cache GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        set_command(key, &value, ttl)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_error("SET", e))?;

        debug!(key, ttl_ms = ttl.map(|t| t.as_millis() as u64), "cache SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_error("DEL", e))?;

        debug!(key, "cache DEL");
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_error("SADD", e))
    }

    async fn members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_error("SMEMBERS", e))
    }

    async fn execute(&self, batch: Batch) -> Vec<StoreResult<()>> {
        if batch.is_empty() {
            return Vec::new();
        }

        let mut conn = self.connection_manager.clone();
        let count = batch.len();
        let pipe = build_pipeline(&batch);

        // Raw replies keep error replies in place as `Value::ServerError`.
        match conn.req_packed_commands(&pipe, 0, count).await {
            Ok(replies) => op_results(replies, count),
            Err(e) => {
                let err = map_error("pipeline", e);
                vec![Err(err); count]
            }
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_error("PING", e))?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Backend(format!("unexpected PING reply: {}", pong)))
        }
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

fn set_command(key: &str, value: &[u8], ttl: Option<Duration>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        cmd.arg("PX").arg(millis.max(1));
    }
    cmd
}

fn build_pipeline(batch: &Batch) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    for op in batch.ops() {
        match op {
            BatchOp::Set { key, value, ttl } => {
                pipe.add_command(set_command(key, value, *ttl));
            }
            BatchOp::Delete { key } => {
                pipe.cmd("DEL").arg(key);
            }
            BatchOp::SetAdd { key, member } => {
                pipe.cmd("SADD").arg(key).arg(member);
            }
        }
    }
    pipe
}

/// Map pipeline replies onto per-operation results.
fn op_results(replies: Vec<Value>, expected: usize) -> Vec<StoreResult<()>> {
    if replies.len() != expected {
        let err = StoreError::Backend(format!(
            "pipeline returned {} replies for {} commands",
            replies.len(),
            expected
        ));
        return vec![Err(err); expected];
    }

    replies
        .into_iter()
        .map(|reply| match reply {
            Value::ServerError(e) => Err(map_error("pipeline", e.into())),
            _ => Ok(()),
        })
        .collect()
}

fn map_error(command: &str, err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Connection(format!("Redis {} failed: {}", command, err))
    } else if err.kind() == redis::ErrorKind::TypeError || err.code() == Some("WRONGTYPE") {
        StoreError::WrongType(format!("Redis {} failed: {}", command, err))
    } else {
        StoreError::Backend(format!("Redis {} failed: {}", command, err))
    }
}

/// Redact credentials from a Redis URL for logging.
fn redact_url(url: &str) -> String {
    let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    if let Some(at_pos) = url.rfind('@').filter(|&at| at >= authority_start) {
        if let Some(colon_pos) = url[authority_start..at_pos].rfind(':') {
            let colon_pos = authority_start + colon_pos;
            return format!("{}***{}", &url[..=colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
