//! Generic CRUD statement builder over the column capability traits.
//!
//! Statements are composed purely from [`Column`] and [`Table`] values: the
//! table comes from the first column, written values and condition values
//! come from each column's [`Column::value`]. Nothing is executed here; the
//! resulting [`Query`] is handed to the driver as `(sql, params_ref)`.
//!
//! ```ignore
//! use tabua::{Crud, ops};
//!
//! let crud = Crud::dollar();
//! let q = crud.insert_returning(&[&user.name, &user.email], &[&user.id])?;
//! let row = client.query_one(q.sql(), &q.params_ref()).await?;
//! ```

mod query;
mod select;


pub use query::{Placeholder, Query};
pub use select::SelectStmt;

use crate::error::{TabuaError, TabuaResult};
use crate::ops::DEFAULT_QUOTE;
use crate::table::{Column, Namer, Table};
use query::Stmt;

/// Statement builder configuration. Stateless and `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crud {
    placeholder: Placeholder,
    quote: char,
}

impl Default for Crud {
    fn default() -> Self {
        Self::new(Placeholder::default())
    }
}

impl Crud {
    pub fn new(placeholder: Placeholder) -> Self {
        Self {
            placeholder,
            quote: DEFAULT_QUOTE,
        }
    }

    /// `$1, $2, ...` placeholders.
    pub fn dollar() -> Self {
        Self::new(Placeholder::Dollar)
    }

    /// `?` placeholders.
    pub fn question() -> Self {
        Self::new(Placeholder::Question)
    }

    /// Use a different identifier quote character.
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    pub fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    fn stmt(&self) -> Stmt {
        Stmt::new(self.placeholder, self.quote)
    }

    /// `SELECT "a", "b" FROM "t" [WHERE "c" = $1 AND ...]`
    pub fn select(&self, cols: &[&dyn Column], conditions: &[&dyn Column]) -> TabuaResult<Query> {
        let table = table_of(cols, "No columns to select")?;
        let mut stmt = self.stmt();
        stmt.push("SELECT ")
            .push_ident_list(cols)
            .push(" FROM ")
            .push_ident(&table)
            .push_where(conditions);
        Ok(stmt.finish())
    }

    /// `INSERT INTO "t" ("a", "b") VALUES ($1, $2)`
    pub fn insert(&self, cols: &[&dyn Column]) -> TabuaResult<Query> {
        Ok(self.insert_stmt(cols)?.finish())
    }

    /// Insert with a `RETURNING` clause (omitted when `returning` is empty).
    pub fn insert_returning(
        &self,
        cols: &[&dyn Column],
        returning: &[&dyn Column],
    ) -> TabuaResult<Query> {
        let mut stmt = self.insert_stmt(cols)?;
        stmt.push_returning(returning);
        Ok(stmt.finish())
    }

    /// Insert resolving conflicts on `conflict`.
    ///
    /// With no `update` columns the conflict is ignored (`DO NOTHING`);
    /// otherwise each listed column takes the proposed row's value.
    pub fn upsert(
        &self,
        cols: &[&dyn Column],
        conflict: &dyn Column,
        update: &[&dyn Column],
    ) -> TabuaResult<Query> {
        let mut stmt = self.insert_stmt(cols)?;
        stmt.push(" ON CONFLICT (").push(conflict.name()).push(")");
        if update.is_empty() {
            stmt.push(" DO NOTHING");
        } else {
            stmt.push(" DO UPDATE SET ");
            for (i, col) in update.iter().enumerate() {
                if i > 0 {
                    stmt.push(", ");
                }
                stmt.push(col.name()).push(" = EXCLUDED.").push(col.name());
            }
        }
        Ok(stmt.finish())
    }

    /// `UPDATE "t" SET "a" = $1, ... [WHERE ...]`
    pub fn update(&self, cols: &[&dyn Column], conditions: &[&dyn Column]) -> TabuaResult<Query> {
        self.update_returning(cols, &[], conditions)
    }

    pub fn update_returning(
        &self,
        cols: &[&dyn Column],
        returning: &[&dyn Column],
        conditions: &[&dyn Column],
    ) -> TabuaResult<Query> {
        let table = table_of(cols, "No columns to update")?;
        let mut stmt = self.stmt();
        stmt.push("UPDATE ")
            .push_ident(&table)
            .push(" SET ")
            .push_assignments(cols, ", ")
            .push_where(conditions)
            .push_returning(returning);
        Ok(stmt.finish())
    }

    /// `DELETE FROM "t" [WHERE ...]`
    pub fn delete(&self, table: &dyn Table, conditions: &[&dyn Column]) -> TabuaResult<Query> {
        self.delete_returning(table, &[], conditions)
    }

    pub fn delete_returning(
        &self,
        table: &dyn Table,
        returning: &[&dyn Column],
        conditions: &[&dyn Column],
    ) -> TabuaResult<Query> {
        let mut stmt = self.stmt();
        stmt.push("DELETE FROM ")
            .push_ident(table.name())
            .push_where(conditions)
            .push_returning(returning);
        Ok(stmt.finish())
    }

    /// Start a composable SELECT over `table`.
    pub fn select_from<'a>(&self, table: &dyn Table) -> SelectStmt<'a> {
        SelectStmt::new(*self, table)
    }

    fn insert_stmt(&self, cols: &[&dyn Column]) -> TabuaResult<Stmt> {
        let table = table_of(cols, "No columns to insert")?;
        let mut stmt = self.stmt();
        stmt.push("INSERT INTO ")
            .push_ident(&table)
            .push(" (")
            .push_ident_list(cols)
            .push(") VALUES (");
        for (i, col) in cols.iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push_bind(col.value());
        }
        stmt.push(")");
        Ok(stmt)
    }
}

/// Name of the table the first column belongs to.
fn table_of(cols: &[&dyn Column], empty: &str) -> TabuaResult<String> {
    match cols.first() {
        Some(col) => Ok(col.table().name().to_string()),
        None => Err(TabuaError::query_generation(empty)),
    }
}
