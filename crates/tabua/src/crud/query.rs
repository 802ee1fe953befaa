use crate::ops::quote;
use crate::param::{Param, ParamList};
use crate::table::{Column, Namer};
use std::fmt::Write;
use tokio_postgres::types::ToSql;

/// Placeholder style for bound arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    /// `?`
    Question,
    /// `$1, $2, ...`
    #[default]
    Dollar,
}

/// A built statement: SQL text plus arguments in placeholder order.
#[derive(Clone, Debug)]
pub struct Query {
    sql: String,
    params: ParamList,
}

impl Query {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &ParamList {
        &self.params
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.as_refs()
    }

    pub fn into_parts(self) -> (String, ParamList) {
        (self.sql, self.params)
    }
}

#[derive(Debug)]
enum SqlPart {
    Raw(String),
    Param,
}

/// Statement under construction. Placeholders are numbered at render time.
pub(crate) struct Stmt {
    placeholder: Placeholder,
    quote: char,
    parts: Vec<SqlPart>,
    params: ParamList,
}

impl Stmt {
    pub(crate) fn new(placeholder: Placeholder, quote: char) -> Self {
        Self {
            placeholder,
            quote,
            parts: Vec::new(),
            params: ParamList::new(),
        }
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    pub(crate) fn push_ident(&mut self, name: &str) -> &mut Self {
        let quoted = quote(name, self.quote);
        self.push(&quoted)
    }

    pub(crate) fn push_qualified(&mut self, col: &dyn Column) -> &mut Self {
        self.push_ident(col.table().name());
        self.push(".");
        self.push_ident(col.name())
    }

    pub(crate) fn push_bind(&mut self, param: Param) -> &mut Self {
        self.params.push_param(param);
        self.parts.push(SqlPart::Param);
        self
    }

    /// `"a", "b"`
    pub(crate) fn push_ident_list(&mut self, cols: &[&dyn Column]) -> &mut Self {
        for (i, col) in cols.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_ident(col.name());
        }
        self
    }

    /// `"a" = <p>, "b" = <p>` with each column's current value.
    pub(crate) fn push_assignments(&mut self, cols: &[&dyn Column], sep: &str) -> &mut Self {
        for (i, col) in cols.iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            self.push_ident(col.name());
            self.push(" = ");
            self.push_bind(col.value());
        }
        self
    }

    /// ` WHERE "c" = <p> AND ...`, nothing when there are no conditions.
    pub(crate) fn push_where(&mut self, conditions: &[&dyn Column]) -> &mut Self {
        if conditions.is_empty() {
            return self;
        }
        self.push(" WHERE ");
        self.push_assignments(conditions, " AND ")
    }

    /// ` RETURNING "x", "y"`, nothing when the list is empty.
    pub(crate) fn push_returning(&mut self, returning: &[&dyn Column]) -> &mut Self {
        if returning.is_empty() {
            return self;
        }
        self.push(" RETURNING ");
        self.push_ident_list(returning)
    }

    pub(crate) fn finish(self) -> Query {
        let mut sql = String::new();
        let mut idx: usize = 0;

        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => sql.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    match self.placeholder {
                        Placeholder::Question => sql.push('?'),
                        Placeholder::Dollar => {
                            let _ = write!(&mut sql, "${idx}");
                        }
                    }
                }
            }
        }

        Query {
            sql,
            params: self.params,
        }
    }
}
