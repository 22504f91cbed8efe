//! In-process store seeded once at startup.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{QuoteStore, StoreError};
use crate::quotes::Quote;

/// An immutable [`QuoteStore`] held in memory.
///
/// Built from seed records that must have unique ids and non-empty texts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    quotes: BTreeMap<u64, String>,
}

impl MemoryStore {
    /// Builds a store from seed records.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidRecord`] on a duplicate id or a blank text.
    pub fn new(seed: impl IntoIterator<Item = Quote>) -> Result<Self, StoreError> {
        let mut quotes = BTreeMap::new();
        for quote in seed {
            if quote.text.trim().is_empty() {
                return Err(StoreError::InvalidRecord {
                    id: quote.id,
                    reason: "text is empty",
                });
            }
            if quotes.insert(quote.id, quote.text).is_some() {
                return Err(StoreError::InvalidRecord {
                    id: quote.id,
                    reason: "duplicate id",
                });
            }
        }
        Ok(Self { quotes })
    }

    /// Parses a JSON array of `{"id": .., "text": ..}` objects.
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let seed: Vec<Quote> = serde_json::from_str(raw)?;
        Self::new(seed)
    }

    /// Reads and parses a JSON seed file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let store = Self::from_json(&raw)?;
        info!(path = %path.display(), records = store.quotes.len(), "quote store seeded");
        Ok(store)
    }
}

#[async_trait]
impl QuoteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_all(&self) -> Result<Vec<Quote>, StoreError> {
        Ok(self
            .quotes
            .iter()
            .map(|(&id, text)| Quote::new(id, text.clone()))
            .collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.quotes.len() as u64)
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Quote>, StoreError> {
        Ok(self.quotes.get(&id).map(|text| Quote::new(id, text.clone())))
    }
}
