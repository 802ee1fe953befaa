//! Schema reversal: one aggregate catalog query → `Vec<Table>`.

use crate::client::CatalogClient;
use crate::error::{TabuaError, TabuaResult};
use crate::model::{Filter, Table};
use tokio_postgres::types::ToSql;

/// A catalog query and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub sql: String,
    pub schema: String,
    pub tables: Option<Vec<String>>,
}

impl CatalogQuery {
    /// Arguments in placeholder order (`$1` schema, `$2` allow-list).
    pub fn params(&self) -> [&(dyn ToSql + Sync); 2] {
        [&self.schema, &self.tables]
    }
}

/// Builds the reversal query for a filter.
pub type SqlGenerator = fn(&Filter) -> CatalogQuery;

/// Name of the single result column holding the JSON document.
pub const TABLES_COLUMN: &str = "tables";

const POSTGRES_REVERSE_SQL: &str = r#"
WITH
cols AS (
  SELECT a.attrelid, a.attnum, c.relname AS table_name, a.attname AS column_name
  FROM pg_catalog.pg_attribute a
  JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
  WHERE a.attnum > 0
    AND NOT a.attisdropped
),
local_cols AS (
  SELECT con.oid AS conoid,
    json_agg(json_build_object('table', lc.table_name, 'column', lc.column_name) ORDER BY k.ord) AS columns_local
  FROM pg_catalog.pg_constraint con
  CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
  JOIN cols lc ON lc.attrelid = con.conrelid AND lc.attnum = k.attnum
  GROUP BY con.oid
),
foreign_cols AS (
  SELECT con.oid AS conoid,
    json_agg(json_build_object('table', fc.table_name, 'column', fc.column_name) ORDER BY k.ord) AS columns_foreign
  FROM pg_catalog.pg_constraint con
  CROSS JOIN LATERAL unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
  JOIN cols fc ON fc.attrelid = con.confrelid AND fc.attnum = k.attnum
  WHERE con.contype = 'f'
  GROUP BY con.oid
),
table_constraints AS (
  SELECT c.relname AS table_name,
    json_agg(json_build_object(
      'name', con.conname,
      'definition', pg_catalog.pg_get_constraintdef(con.oid),
      'type', CASE con.contype
        WHEN 'f' THEN 'FOREIGN KEY'
        WHEN 'p' THEN 'PRIMARY KEY'
        WHEN 'c' THEN 'CHECK'
        WHEN 'u' THEN 'UNIQUE'
      END,
      'columns_local', COALESCE(lc.columns_local, '[]'::json),
      'columns_foreign', COALESCE(fc.columns_foreign, '[]'::json)
    ) ORDER BY con.conname) AS constraints
  FROM pg_catalog.pg_constraint con
  JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
  JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
  LEFT JOIN local_cols lc ON lc.conoid = con.oid
  LEFT JOIN foreign_cols fc ON fc.conoid = con.oid
  WHERE n.nspname = $1
    AND con.contype IN ('f', 'p', 'c', 'u')
  GROUP BY c.relname
),
columns_list AS (
  SELECT ic.table_name,
    pg_catalog.obj_description(c.oid, 'pg_class') AS comment,
    json_agg(json_build_object(
      'name', ic.column_name,
      'udt_name', ic.udt_name,
      'non_null', ic.is_nullable = 'NO',
      'data_type', ic.data_type,
      'comment', pg_catalog.col_description(c.oid, a.attnum),
      'dimension', a.attndims
    ) ORDER BY ic.ordinal_position) AS columns
  FROM information_schema.columns ic
  JOIN pg_catalog.pg_namespace n ON n.nspname = ic.table_schema
  JOIN pg_catalog.pg_class c ON c.relnamespace = n.oid AND c.relname = ic.table_name
  JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid AND a.attname = ic.column_name
  WHERE ic.table_schema = $1
  GROUP BY ic.table_name, c.oid
),
all_tables AS (
  SELECT cl.table_name,
    json_build_object(
      'name', cl.table_name,
      'columns', cl.columns,
      'constraints', COALESCE(tc.constraints, '[]'::json),
      'comment', cl.comment
    ) AS tbl
  FROM columns_list cl
  LEFT JOIN table_constraints tc USING (table_name)
  WHERE $2::text[] IS NULL OR cl.table_name = ANY($2::text[])
)
SELECT COALESCE(json_agg(all_tables.tbl ORDER BY all_tables.table_name), '[]'::json)::text AS tables
FROM all_tables
"#;

/// The PostgreSQL reversal query.
///
/// The allow-list is bound as a single `text[]`, so the statement text is the
/// same for every filter.
pub fn sql_from_postgres(filter: &Filter) -> CatalogQuery {
    CatalogQuery {
        sql: POSTGRES_REVERSE_SQL.to_string(),
        schema: filter.schema.clone(),
        tables: filter.tables.clone(),
    }
}

/// Decode the aggregate document.
///
/// `None` (no row, or SQL `NULL`) is the "no tables" condition. An empty JSON
/// array is a successful, empty result.
pub fn decode_tables(document: Option<&str>) -> TabuaResult<Vec<Table>> {
    let Some(document) = document else {
        return Err(TabuaError::NoTables("No result from query".to_string()));
    };

    let tables: Vec<Table> = serde_json::from_str(document)?;
    for table in &tables {
        for constraint in &table.constraints {
            constraint.validate()?;
        }
    }
    Ok(tables)
}

/// Reverses a database schema into [`Table`]s.
pub struct Reverser<C> {
    client: C,
    generator: SqlGenerator,
}

impl<C: CatalogClient> Reverser<C> {
    /// Reverser using the PostgreSQL catalog query.
    pub fn new(client: C) -> Self {
        Self::with_generator(client, sql_from_postgres)
    }

    /// Reverser using a custom query generator.
    pub fn with_generator(client: C, generator: SqlGenerator) -> Self {
        Self { client, generator }
    }

    /// Borrow the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one reversal pass: exactly one catalog round trip.
    pub async fn run(&self, filter: &Filter) -> TabuaResult<Vec<Table>> {
        let query = (self.generator)(filter);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            schema = %query.schema,
            tables = ?query.tables,
            "running reversal query"
        );

        let document = self
            .client
            .query_document(&query.sql, &query.params())
            .await?;
        let tables = decode_tables(document.as_deref())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(count = tables.len(), "decoded reversed tables");

        Ok(tables)
    }
}
