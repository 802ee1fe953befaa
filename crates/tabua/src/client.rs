//! Catalog connection used by the reverser.
//!
//! The connection is owned by the caller; tabua never opens, pools, or retries
//! connections.

use crate::error::{TabuaError, TabuaResult};
use crate::reverse::TABLES_COLUMN;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A connection able to run the reversal query.
///
/// Implemented for `tokio_postgres::Client`, `tokio_postgres::Transaction`,
/// and references to either.
#[async_trait::async_trait]
pub trait CatalogClient: Sync {
    /// Execute a query returning at most one row and read its
    /// [`TABLES_COLUMN`] as text.
    ///
    /// `None` when the query returns no row or the column is SQL `NULL`.
    async fn query_document(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> TabuaResult<Option<String>>;
}

fn document_of(row: Option<Row>) -> TabuaResult<Option<String>> {
    match row {
        Some(row) => row.try_get_column(TABLES_COLUMN),
        None => Ok(None),
    }
}

#[async_trait::async_trait]
impl CatalogClient for tokio_postgres::Client {
    async fn query_document(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> TabuaResult<Option<String>> {
        let row = tokio_postgres::Client::query_opt(self, sql, params)
            .await
            .map_err(TabuaError::from_db_error)?;
        document_of(row)
    }
}

#[async_trait::async_trait]
impl<'a> CatalogClient for tokio_postgres::Transaction<'a> {
    async fn query_document(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> TabuaResult<Option<String>> {
        let row = tokio_postgres::Transaction::query_opt(self, sql, params)
            .await
            .map_err(TabuaError::from_db_error)?;
        document_of(row)
    }
}

#[async_trait::async_trait]
impl<T: CatalogClient + ?Sized> CatalogClient for &T {
    async fn query_document(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> TabuaResult<Option<String>> {
        (**self).query_document(sql, params).await
    }
}

/// Extension trait for reading row columns with tabua errors.
pub trait RowExt {
    /// Get a column value by name.
    fn try_get_column<'a, T>(&'a self, column: &str) -> TabuaResult<T>
    where
        T: tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<'a, T>(&'a self, column: &str) -> TabuaResult<T>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column).map_err(TabuaError::from_db_error)
    }
}
