//! Store port: the durable, read-only source of quotes.
//!
//! "No such record" is an ordinary `Ok(None)` from
//! [`QuoteStore::get_by_id`]; [`StoreError`] is reserved for infrastructure
//! faults.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::quotes::Quote;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed seed data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid seed record {id}: {reason}")]
    InvalidRecord { id: u64, reason: &'static str },
}

/// Read access to the quote table. Handles are shared by all requests and
/// must be internally synchronized.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Every record, in ascending id order.
    async fn list_all(&self) -> Result<Vec<Quote>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn get_by_id(&self, id: u64) -> Result<Option<Quote>, StoreError>;
}
