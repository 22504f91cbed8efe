//! Cache port: a key/value store with expiring entries.
//!
//! The engine never deletes entries; they disappear when their TTL elapses.
//! A lookup has three outcomes and they are kept apart:
//!
//! | Outcome                        | Meaning                               |
//! |--------------------------------|---------------------------------------|
//! | `Ok(CacheLookup::Hit(value))`  | key present and not expired           |
//! | `Ok(CacheLookup::Miss)`        | key absent or expired (normal)        |
//! | `Err(CacheError)`              | the backend failed                    |

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Result of a successful cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    Miss,
}

/// Infrastructure failures of a cache backend. Never used to signal a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache rejected the write: {0}")]
    Rejected(String),
}

/// An expiring key/value store shared by all in-flight requests.
///
/// Implementations provide their own internal synchronization. A `set` must be
/// applied entirely or not at all.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}
