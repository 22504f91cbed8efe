//! PostgreSQL store over the `quotes(id, quote)` table.
//!
//! The table is read-only to citaty and is expected to exist:
//!
//! ```sql
//! CREATE TABLE quotes (id BIGINT PRIMARY KEY, quote TEXT NOT NULL);
//! ```

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

use super::{QuoteStore, StoreError};
use crate::quotes::Quote;

const LIST_ALL: &str = "SELECT id, quote FROM quotes WHERE id >= 0 ORDER BY id";
const COUNT: &str = "SELECT count(*) FROM quotes WHERE id >= 0";
const BY_ID: &str = "SELECT id, quote FROM quotes WHERE id = $1";

/// A [`QuoteStore`] backed by a pooled PostgreSQL connection.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("PostgresStore")
            .field("size", &status.size)
            .field("max_size", &status.max_size)
            .finish()
    }
}

impl PostgresStore {
    /// Builds the connection pool for `url`. Connections are opened lazily.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the pool cannot be configured from `url`.
    pub fn connect(url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(url.to_owned());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable(format!("failed to create pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Opens one connection to prove the database is reachable.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if no connection can be established.
    pub async fn verify(&self) -> Result<(), StoreError> {
        self.client().await?;
        info!("connected to postgres");
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(unavailable)
    }
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Converts one `(id, quote)` row. Negative ids cannot be addressed by the
/// service and are reported as store faults.
fn quote_from_columns(id: i64, text: String) -> Result<Quote, StoreError> {
    let id = u64::try_from(id)
        .map_err(|_| StoreError::Unavailable(format!("negative quote id {id}")))?;
    Ok(Quote::new(id, text))
}

/// `BIGINT` holds ids up to `i64::MAX`; larger ids cannot be stored.
fn id_param(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn count_from(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[async_trait]
impl QuoteStore for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn list_all(&self) -> Result<Vec<Quote>, StoreError> {
        let client = self.client().await?;
        let rows = client.query(LIST_ALL, &[]).await.map_err(unavailable)?;
        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get(0).map_err(unavailable)?;
                let text: String = row.try_get(1).map_err(unavailable)?;
                quote_from_columns(id, text)
            })
            .collect()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let client = self.client().await?;
        let row = client.query_one(COUNT, &[]).await.map_err(unavailable)?;
        let count: i64 = row.try_get(0).map_err(unavailable)?;
        Ok(count_from(count))
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Quote>, StoreError> {
        let Some(id) = id_param(id) else {
            return Ok(None);
        };
        let client = self.client().await?;
        let row = client.query_opt(BY_ID, &[&id]).await.map_err(unavailable)?;
        row.map(|row| {
            let id: i64 = row.try_get(0).map_err(unavailable)?;
            let text: String = row.try_get(1).map_err(unavailable)?;
            quote_from_columns(id, text)
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_become_quotes() {
        let quote = quote_from_columns(7, "Act.".to_owned()).unwrap();
        assert_eq!(quote, Quote::new(7, "Act."));
    }

    #[test]
    fn negative_row_ids_are_rejected() {
        assert!(matches!(
            quote_from_columns(-1, "x".to_owned()),
            Err(StoreError::Unavailable(msg)) if msg.contains("-1")
        ));
    }

    #[test]
    fn ids_beyond_bigint_have_no_row() {
        assert_eq!(id_param(5), Some(5));
        assert_eq!(id_param(i64::MAX as u64), Some(i64::MAX));
        assert_eq!(id_param(u64::MAX), None);
    }

    #[test]
    fn count_never_goes_negative() {
        assert_eq!(count_from(3), 3);
        assert_eq!(count_from(-1), 0);
    }

    #[test]
    fn malformed_url_is_unavailable() {
        let err = PostgresStore::connect("not-a-connection-string", 2).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn ids_beyond_bigint_skip_the_database() {
        let store = PostgresStore::connect("postgres://citaty@127.0.0.1:1/citaty", 1).unwrap();
        assert_eq!(store.get_by_id(u64::MAX).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreachable_database_is_unavailable() {
        let store = PostgresStore::connect("postgres://citaty@127.0.0.1:1/citaty", 1).unwrap();
        assert!(matches!(store.count().await, Err(StoreError::Unavailable(_))));
        assert!(store.verify().await.is_err());
    }
}
