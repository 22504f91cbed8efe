//! Cache-aside quote retrieval.
//!
//! Single-quote reads go cache first, store second:
//!
//! ```text
//! cache.get(id) ── Hit ──────────────────────────────► quote
//!      │
//!      ├─ Miss / fault ─► store.get_by_id(id) ── None ─► NotFound (cache untouched)
//!      │                        │
//!      │                       Some ─► cache.set(id, text, ttl) ─► quote
//!      │                                    (a failed set is only logged)
//! ```
//!
//! Listing never touches the cache. No request-level locking is done: two
//! cold reads of the same id may both reach the store and both write the same
//! value back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use super::Quote;
use crate::cache::{Cache, CacheError, CacheLookup};
use crate::database::{QuoteStore, StoreError};

/// Default lifetime of an entry written after a store hit.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default bound on any single cache or store call.
pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum QuoteError {
    /// Absent record, malformed id, or nothing to choose from.
    #[error("quote not found: {reason}")]
    NotFound { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QuoteError {
    fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }
}

/// Source of the id drawn by [`QuoteService::random_quote`].
pub trait IdSampler: Send + Sync {
    /// Returns an id uniformly distributed in `0..bound`. `bound` is never zero.
    fn sample(&self, bound: u64) -> u64;
}

/// Draws from the thread-local generator, which is seeded from the OS once
/// per thread rather than per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl IdSampler for ThreadRngSampler {
    fn sample(&self, bound: u64) -> u64 {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// The quote retrieval engine.
///
/// Holds shared handles to both ports; cloning is cheap.
#[derive(Clone)]
pub struct QuoteService {
    store: Arc<dyn QuoteStore>,
    cache: Arc<dyn Cache>,
    sampler: Arc<dyn IdSampler>,
    cache_ttl: Duration,
    port_timeout: Duration,
}

impl QuoteService {
    pub fn new(store: Arc<dyn QuoteStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            sampler: Arc::new(ThreadRngSampler),
            cache_ttl: DEFAULT_CACHE_TTL,
            port_timeout: DEFAULT_PORT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_port_timeout(mut self, timeout: Duration) -> Self {
        self.port_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn IdSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Every quote, straight from the store.
    ///
    /// # Errors
    ///
    /// [`QuoteError::NotFound`] when the store is empty, [`QuoteError::Store`]
    /// when the read fails.
    pub async fn list_all(&self) -> Result<Vec<Quote>, QuoteError> {
        let quotes = self
            .bounded(self.store.list_all(), StoreError::Timeout)
            .await?;
        if quotes.is_empty() {
            return Err(QuoteError::not_found("store is empty"));
        }
        Ok(quotes)
    }

    /// A uniformly chosen quote with an id in `0..count`.
    ///
    /// The bound is the live record count, queried on every call. A failed
    /// count query is reported as [`QuoteError::NotFound`], like an empty store.
    pub async fn random_quote(&self) -> Result<Quote, QuoteError> {
        let count = match self.bounded(self.store.count(), StoreError::Timeout).await {
            Ok(0) => return Err(QuoteError::not_found("store is empty")),
            Ok(count) => count,
            Err(e) => return Err(QuoteError::not_found(format!("count query failed: {e}"))),
        };
        let id = self.sampler.sample(count);
        debug!(id, count, "drew random quote id");
        self.lookup(id).await
    }

    /// The quote whose id is the decimal string `raw`.
    ///
    /// A string that is not a non-negative integer is reported as
    /// [`QuoteError::NotFound`], same as an id with no record.
    pub async fn quote_by_id(&self, raw: &str) -> Result<Quote, QuoteError> {
        let id: u64 = raw
            .parse()
            .map_err(|_| QuoteError::not_found(format!("malformed id {raw:?}")))?;
        self.lookup(id).await
    }

    async fn lookup(&self, id: u64) -> Result<Quote, QuoteError> {
        let key = id.to_string();

        match self.bounded(self.cache.get(&key), CacheError::Timeout).await {
            Ok(CacheLookup::Hit(text)) => {
                debug!(id, "cache hit");
                return Ok(Quote::new(id, text));
            }
            Ok(CacheLookup::Miss) => debug!(id, "cache miss"),
            Err(e) => warn!(
                id,
                cache = self.cache.name(),
                error = %e,
                "cache read failed, falling back to store"
            ),
        }

        let quote = self
            .bounded(self.store.get_by_id(id), StoreError::Timeout)
            .await?
            .ok_or_else(|| QuoteError::not_found(format!("no quote with id {id}")))?;

        let populate = self.cache.set(&key, &quote.text, self.cache_ttl);
        if let Err(e) = self.bounded(populate, CacheError::Timeout).await {
            warn!(
                id,
                cache = self.cache.name(),
                error = %e,
                "failed to populate cache"
            );
        }

        Ok(quote)
    }

    /// Runs a port call under the port timeout.
    async fn bounded<T, E>(
        &self,
        call: impl Future<Output = Result<T, E>>,
        on_timeout: impl FnOnce(Duration) -> E,
    ) -> Result<T, E> {
        match tokio::time::timeout(self.port_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(self.port_timeout)),
        }
    }
}
