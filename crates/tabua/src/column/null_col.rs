use crate::error::TabuaResult;
use crate::param::Param;
use crate::table::{Column, Namer, Table};
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{FromSql, Type};

/// A column that keeps the identity of another column but binds SQL `NULL`.
///
/// Used to pad a partial column set to a full one (see
/// [`crate::ops::null_fill`]).
#[derive(Clone, Copy)]
pub struct NullCol<'a> {
    inner: &'a dyn Column,
}

impl<'a> NullCol<'a> {
    pub fn new(inner: &'a dyn Column) -> Self {
        Self { inner }
    }

    /// The column this one stands in for.
    pub fn inner(&self) -> &'a dyn Column {
        self.inner
    }

    /// Reads into a null column are discarded.
    pub fn scan(&mut self, _src: Option<&[u8]>) -> TabuaResult<()> {
        Ok(())
    }
}

impl fmt::Debug for NullCol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NullCol").field(&self.inner.name()).finish()
    }
}

impl Namer for NullCol<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl Column for NullCol<'_> {
    fn table(&self) -> Box<dyn Table + '_> {
        self.inner.table()
    }

    fn sql_type(&self) -> String {
        self.inner.sql_type()
    }

    fn non_null(&self) -> bool {
        self.inner.non_null()
    }

    fn value(&self) -> Param {
        Param::null()
    }
}

/// Row sink for a null column: accepts any column type and ignores the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Discard;

impl<'a> FromSql<'a> for Discard {
    fn from_sql(_ty: &Type, _raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Discard)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Discard)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
