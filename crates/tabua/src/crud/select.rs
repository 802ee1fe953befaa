//! Composable SELECT with foreign-key joins.

use super::Crud;
use super::query::{Query, Stmt};
use crate::error::{TabuaError, TabuaResult};
use crate::table::{Column, Fk, Namer, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
        }
    }
}

/// A join resolved to names when it is added.
#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    on: Vec<(QualifiedName, QualifiedName)>,
}

#[derive(Debug, Clone)]
struct QualifiedName {
    table: String,
    column: String,
}

impl QualifiedName {
    fn of(col: &dyn Column) -> Self {
        Self {
            table: col.table().name().to_string(),
            column: col.name().to_string(),
        }
    }
}

/// SELECT builder over one base table.
///
/// Columns and conditions are rendered qualified (`"t"."c"`) so they stay
/// unambiguous once joins are added.
pub struct SelectStmt<'a> {
    crud: Crud,
    table: String,
    columns: Vec<&'a dyn Column>,
    joins: Vec<Join>,
    conditions: Vec<&'a dyn Column>,
    invalid: Option<String>,
}

impl<'a> SelectStmt<'a> {
    pub(crate) fn new(crud: Crud, table: &dyn Table) -> Self {
        Self {
            crud,
            table: table.name().to_string(),
            columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            invalid: None,
        }
    }

    /// Add selected columns. With none, the statement selects `*`.
    pub fn columns(mut self, cols: &[&'a dyn Column]) -> Self {
        self.columns.extend_from_slice(cols);
        self
    }

    /// `JOIN` the referenced table along a foreign key.
    pub fn join(self, fk: &Fk<'_>) -> Self {
        self.push_join(JoinKind::Inner, fk)
    }

    /// `LEFT JOIN` the referenced table along a foreign key.
    pub fn left_join(self, fk: &Fk<'_>) -> Self {
        self.push_join(JoinKind::Left, fk)
    }

    /// `RIGHT JOIN` the referenced table along a foreign key.
    pub fn right_join(self, fk: &Fk<'_>) -> Self {
        self.push_join(JoinKind::Right, fk)
    }

    /// Equality conditions on each column's current value, ANDed in order.
    pub fn where_eq(mut self, conditions: &[&'a dyn Column]) -> Self {
        self.conditions.extend_from_slice(conditions);
        self
    }

    fn push_join(mut self, kind: JoinKind, fk: &Fk<'_>) -> Self {
        if !fk.is_well_formed() {
            self.invalid.get_or_insert_with(|| {
                format!(
                    "Malformed join: {} local and {} foreign columns",
                    fk.from.len(),
                    fk.to.len()
                )
            });
            return self;
        }

        let on: Vec<_> = fk
            .from
            .iter()
            .zip(&fk.to)
            .map(|(from, to)| (QualifiedName::of(&**from), QualifiedName::of(&**to)))
            .collect();
        let table = on[0].1.table.clone();
        self.joins.push(Join { kind, table, on });
        self
    }

    pub fn build(self) -> TabuaResult<Query> {
        if let Some(message) = self.invalid {
            return Err(TabuaError::query_generation(message));
        }

        let mut stmt = Stmt::new(self.crud.placeholder(), self.crud.quote());
        stmt.push("SELECT ");
        if self.columns.is_empty() {
            stmt.push("*");
        }
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push_qualified(*col);
        }

        stmt.push(" FROM ");
        stmt.push_ident(&self.table);

        for join in &self.joins {
            stmt.push(join.kind.keyword());
            stmt.push_ident(&join.table);
            stmt.push(" ON ");
            for (i, (from, to)) in join.on.iter().enumerate() {
                if i > 0 {
                    stmt.push(" AND ");
                }
                stmt.push_ident(&from.table);
                stmt.push(".");
                stmt.push_ident(&from.column);
                stmt.push(" = ");
                stmt.push_ident(&to.table);
                stmt.push(".");
                stmt.push_ident(&to.column);
            }
        }

        for (i, col) in self.conditions.iter().enumerate() {
            stmt.push(if i == 0 { " WHERE " } else { " AND " });
            stmt.push_qualified(*col);
            stmt.push(" = ");
            stmt.push_bind(col.value());
        }

        Ok(stmt.finish())
    }
}
