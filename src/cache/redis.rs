//! Redis cache backend, shared by every citaty instance pointed at it.
//!
//! Expiry is delegated to Redis with `SET key value EX secs`, so no sweeper is
//! needed. A nil reply is an ordinary miss; any transport or protocol failure
//! is [`CacheError::Unavailable`].

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, RedisResult};
use tracing::{debug, info};

use super::{Cache, CacheError, CacheLookup};

/// A [`Cache`] over a pooled Redis connection.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisCache")
            .field("size", &status.size)
            .field("max_size", &status.max_size)
            .finish()
    }
}

impl RedisCache {
    /// Builds the connection pool. No connection is opened until first use;
    /// call [`verify`](Self::verify) to fail fast at startup.
    ///
    /// `timeout` bounds waiting for, creating and recycling a pooled
    /// connection.
    ///
    /// # Errors
    ///
    /// [`CacheError::Unavailable`] if `url` is not a usable Redis URL.
    pub fn connect(url: &str, pool_size: usize, timeout: Duration) -> Result<Self, CacheError> {
        let mut config = deadpool_redis::Config::from_url(url);
        let pool_config = config.pool.get_or_insert_with(PoolConfig::default);
        pool_config.max_size = pool_size;
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(format!("failed to create pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Checks out one connection to prove the server is reachable.
    ///
    /// # Errors
    ///
    /// [`CacheError::Unavailable`] if no connection can be established.
    pub async fn verify(&self) -> Result<(), CacheError> {
        self.connection().await?;
        info!("connected to redis");
        Ok(())
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

/// Maps a `GET` reply. Redis answers nil for both absent and expired keys.
fn lookup_from(reply: RedisResult<Option<String>>) -> Result<CacheLookup, CacheError> {
    match reply {
        Ok(Some(value)) => Ok(CacheLookup::Hit(value)),
        Ok(None) => Ok(CacheLookup::Miss),
        Err(e) => Err(CacheError::Unavailable(e.to_string())),
    }
}

fn write_from(reply: RedisResult<()>) -> Result<(), CacheError> {
    reply.map_err(|e| CacheError::Unavailable(e.to_string()))
}

/// Whole seconds for `EX`, rounded up so an entry lives at least its TTL.
fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs }
}

#[async_trait]
impl Cache for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let mut conn = self.connection().await?;
        lookup_from(conn.get::<_, Option<String>>(key).await)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::Rejected("ttl must be positive".to_owned()));
        }
        let secs = expiry_secs(ttl);
        let mut conn = self.connection().await?;
        write_from(conn.set_ex::<_, _, ()>(key, value, secs).await)?;
        debug!(key, ttl_secs = secs, "cache set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use redis::{ErrorKind, RedisError, Value, from_redis_value};

    use super::*;

    fn io_error() -> RedisError {
        RedisError::from((ErrorKind::IoError, "connection reset"))
    }

    #[test]
    fn nil_reply_is_a_miss() {
        let reply = from_redis_value::<Option<String>>(&Value::Nil);
        assert_eq!(lookup_from(reply).unwrap(), CacheLookup::Miss);
    }

    #[test]
    fn bulk_reply_is_a_hit() {
        let reply = from_redis_value::<Option<String>>(&Value::BulkString(b"cached".to_vec()));
        assert_eq!(
            lookup_from(reply).unwrap(),
            CacheLookup::Hit("cached".to_owned())
        );
    }

    #[test]
    fn redis_errors_are_unavailable() {
        assert!(matches!(
            lookup_from(Err(io_error())),
            Err(CacheError::Unavailable(msg)) if msg.contains("connection reset")
        ));
        assert!(matches!(
            write_from(Err(io_error())),
            Err(CacheError::Unavailable(_))
        ));
        assert!(write_from(Ok(())).is_ok());
    }

    #[test]
    fn expiry_rounds_up_to_whole_seconds() {
        assert_eq!(expiry_secs(Duration::from_secs(60)), 60);
        assert_eq!(expiry_secs(Duration::from_millis(1500)), 2);
        assert_eq!(expiry_secs(Duration::from_millis(1)), 1);
    }

    #[test]
    fn malformed_url_is_unavailable() {
        let err = RedisCache::connect("not a url", 4, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, CacheError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let cache =
            RedisCache::connect("redis://127.0.0.1:1", 1, Duration::from_millis(200)).unwrap();
        assert!(matches!(
            cache.get("k").await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(matches!(
            cache.set("k", "v", Duration::from_secs(1)).await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(cache.verify().await.is_err());
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected_before_connecting() {
        let cache =
            RedisCache::connect("redis://127.0.0.1:1", 1, Duration::from_millis(200)).unwrap();
        assert!(matches!(
            cache.set("k", "v", Duration::ZERO).await,
            Err(CacheError::Rejected(_))
        ));
    }
}
