//! In-process cache backend.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::{Cache, CacheError, CacheLookup};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A [`Cache`] backed by a sharded concurrent map.
///
/// Expired entries are dropped lazily by [`get`](Cache::get) and in bulk by
/// [`purge_expired`](Self::purge_expired), which the binary calls on an
/// interval. Expiry uses the tokio clock, so paused-time tests can advance it.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        purged
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(CacheLookup::Hit(entry.value.clone()));
            }
        }
        // The read guard above is released before this point.
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(CacheLookup::Miss)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::Rejected("ttl must be positive".to_owned()));
        }
        let entry = Entry {
            value: value.to_owned(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }
}
