//! Cache Store (§4.A). Grounded on `dashflow-redis-checkpointer`'s use of
//! `redis::aio::ConnectionManager` — this workspace reuses the manager's
//! own reconnect loop rather than reimplementing one, and configures it to
//! match §4.A's policy: "up to 3 reconnects with exponential backoff
//! capped at 2s; offline queue disabled".
//!
//! Every method here returns a plain value, never a `Result` that could
//! propagate into pipeline code: "Cache operations must never throw into
//! callers — on connection failure, `get` returns miss, `set` is a no-op,
//! and a warning is logged" (§4.A).

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use research_core::config::RedisConfig;

const MAX_RECONNECTS: usize = 3;
const MAX_RECONNECT_DELAY_MS: u64 = 2_000;

/// A connected cache store. Cheap to clone (the underlying
/// `ConnectionManager` is itself a cheap-to-clone handle).
#[derive(Clone)]
pub struct CacheStore {
    conn: ConnectionManager,
}

impl CacheStore {
    /// Connects with the reconnect policy §4.A mandates. This is the one
    /// fallible operation in this type: a caller with no cache at all
    /// should fail startup loudly rather than silently run without one,
    /// whereas a cache that *drops* mid-run degrades silently via the
    /// per-method fallbacks below.
    pub async fn connect(config: &RedisConfig) -> anyhow::Result<Self> {
        let url = build_redis_url(config);
        let client = redis::Client::open(url)?;
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(MAX_RECONNECTS)
            .set_max_delay(MAX_RECONNECT_DELAY_MS);
        let conn = client.get_connection_manager_with_config(manager_config).await?;
        Ok(Self { conn })
    }

    /// Stable short hex digest of `s`, used to fingerprint cache keys
    /// (§3/§4.A `hashKey`).
    #[must_use]
    pub fn hash_key(s: &str) -> String {
        let digest = Sha256::digest(s.as_bytes());
        hex::encode(&digest[..8])
    }

    pub async fn set(&self, key: &str, value: &serde_json::Value, ttl_secs: u64) -> bool {
        let mut conn = self.conn.clone();
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(%key, error = %err, "failed to serialize cache value; skipping set");
                return false;
            }
        };
        let result: Result<(), redis::RedisError> = if ttl_secs > 0 {
            conn.set_ex(key, payload, ttl_secs).await
        } else {
            conn.set(key, payload).await
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache set failed; continuing without cache");
                false
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache get failed; treating as miss");
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.del::<_, u64>(key).await {
            Ok(n) => n > 0,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache delete failed");
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        conn.exists(key).await.unwrap_or_else(|err| {
            tracing::warn!(%key, error = %err, "cache exists check failed; assuming absent");
            false
        })
    }

    pub async fn ttl(&self, key: &str) -> Option<i64> {
        let mut conn = self.conn.clone();
        match conn.ttl::<_, i64>(key).await {
            Ok(t) if t >= 0 => Some(t),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache ttl lookup failed");
                None
            }
        }
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> Option<i64> {
        let mut conn = self.conn.clone();
        match conn.incr::<_, _, i64>(key, delta).await {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache incrBy failed");
                None
            }
        }
    }

    /// Pattern delete via a streamed `SCAN` (§4.A), rather than `KEYS`,
    /// so a large keyspace does not block the Redis event loop.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let mut conn = self.conn.clone();
        let mut deleted = 0u64;
        let keys: Vec<String> = {
            let iter_result: Result<redis::AsyncIter<'_, String>, redis::RedisError> = conn
                .scan_match(pattern)
                .await;
            let mut iter = match iter_result {
                Ok(iter) => iter,
                Err(err) => {
                    tracing::warn!(%pattern, error = %err, "cache pattern scan failed");
                    return 0;
                }
            };
            let mut keys = Vec::new();
            while let Some(key) = futures_next(&mut iter).await {
                keys.push(key);
            }
            keys
        };
        if keys.is_empty() {
            return 0;
        }
        match conn.del::<_, u64>(&keys).await {
            Ok(n) => {
                deleted += n;
            }
            Err(err) => {
                tracing::warn!(%pattern, error = %err, "cache pattern delete failed");
            }
        }
        deleted
    }

    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

/// Small indirection so the `SCAN` loop above reads top-to-bottom without
/// re-deriving `StreamExt` plumbing inline.
async fn futures_next<T>(iter: &mut redis::AsyncIter<'_, T>) -> Option<T>
where
    T: redis::FromRedisValue + Unpin + Send,
{
    use futures::StreamExt;
    iter.next().await
}

fn build_redis_url(config: &RedisConfig) -> String {
    match &config.password {
        Some(password) => format!(
            "redis://:{password}@{}:{}/{}",
            config.host, config.port, config.db
        ),
        None => format!("redis://{}:{}/{}", config.host, config.port, config.db),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_is_stable_and_short() {
        let a = CacheStore::hash_key("ai trends 2025");
        let b = CacheStore::hash_key("ai trends 2025");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn hash_key_differs_for_different_inputs() {
        let a = CacheStore::hash_key("ai trends 2025");
        let b = CacheStore::hash_key("2025 trends in ai");
        assert_ne!(a, b);
    }

    #[test]
    fn build_redis_url_includes_password_when_set() {
        let config = RedisConfig {
            host: "cache.internal".into(),
            port: 6380,
            password: Some("secret".into()),
            db: 2,
        };
        assert_eq!(
            build_redis_url(&config),
            "redis://:secret@cache.internal:6380/2"
        );
    }

    #[test]
    fn build_redis_url_omits_password_when_absent() {
        let config = RedisConfig {
            host: "localhost".into(),
            port: 6379,
            password: None,
            db: 0,
        };
        assert_eq!(build_redis_url(&config), "redis://localhost:6379/0");
    }
}
