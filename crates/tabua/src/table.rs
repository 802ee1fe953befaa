//! Capability traits shared by the builder and the structural model.
//!
//! The CRUD builder and the column-set algebra only see these traits, so the
//! same builder serves reversed tables and hand-written (or generated) ones.

use crate::param::Param;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Constraint kinds reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "CHECK")]
    Check,
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey,
}

impl ConstraintType {
    /// Catalog spelling (`"PRIMARY KEY"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintType::Unique => "UNIQUE",
            ConstraintType::Check => "CHECK",
            ConstraintType::PrimaryKey => "PRIMARY KEY",
            ConstraintType::ForeignKey => "FOREIGN KEY",
        }
    }

    /// Parse the catalog spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNIQUE" => Some(ConstraintType::Unique),
            "CHECK" => Some(ConstraintType::Check),
            "PRIMARY KEY" => Some(ConstraintType::PrimaryKey),
            "FOREIGN KEY" => Some(ConstraintType::ForeignKey),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object with a SQL name.
pub trait Namer {
    fn name(&self) -> &str;
}

/// A column together with its current value.
pub trait Column: Namer {
    /// The table this column belongs to.
    fn table(&self) -> Box<dyn Table + '_>;

    /// `"<udt_name>,<data_type>"`.
    fn sql_type(&self) -> String;

    fn non_null(&self) -> bool;

    /// The value bound when this column is written or used as a condition.
    fn value(&self) -> Param;
}

/// A table: its columns and constraints.
pub trait Table: Namer {
    fn columns(&self) -> Vec<Box<dyn Column + '_>>;
    fn constraints(&self) -> Vec<Box<dyn Constrainer + '_>>;
}

/// A table constraint.
///
/// Kind-specific data is reached through the `as_*` accessors; an
/// implementation overrides the one matching its [`ConstraintType`].
pub trait Constrainer: Namer {
    fn constraint_type(&self) -> ConstraintType;

    /// Engine-native DDL fragment.
    fn definition(&self) -> String;

    fn as_unique(&self) -> Option<&dyn UniqueConstrainer> {
        None
    }

    fn as_check(&self) -> Option<&dyn CheckConstrainer> {
        None
    }

    fn as_primary_key(&self) -> Option<&dyn PkConstrainer> {
        None
    }

    fn as_foreign_key(&self) -> Option<&dyn FkConstrainer> {
        None
    }
}

/// Limits columns to unique values.
pub trait UniqueConstrainer: Constrainer {
    fn uniques(&self) -> Vec<Box<dyn Column + '_>>;
}

/// A SQL check over columns.
pub trait CheckConstrainer: Constrainer {
    fn check_columns(&self) -> Vec<Box<dyn Column + '_>>;
}

/// Table primary key.
pub trait PkConstrainer: Constrainer {
    fn keys(&self) -> Vec<Box<dyn Column + '_>>;
}

/// Table foreign key.
pub trait FkConstrainer: Constrainer {
    fn key(&self) -> Fk<'_>;
}

/// A join edge: `from[i]` references `to[i]`.
pub struct Fk<'a> {
    pub from: Vec<Box<dyn Column + 'a>>,
    pub to: Vec<Box<dyn Column + 'a>>,
}

impl Fk<'_> {
    /// Both sides are non-empty and pair up positionally.
    pub fn is_well_formed(&self) -> bool {
        !self.from.is_empty() && self.from.len() == self.to.len()
    }
}

impl fmt::Debug for Fk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fk")
            .field("from", &qualified_names(&self.from))
            .field("to", &qualified_names(&self.to))
            .finish()
    }
}

fn qualified_names(cols: &[Box<dyn Column + '_>]) -> Vec<String> {
    cols.iter()
        .map(|c| format!("{}.{}", c.table().name(), c.name()))
        .collect()
}

impl<T: Namer + ?Sized> Namer for &T {
    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Namer + ?Sized> Namer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Column + ?Sized> Column for &T {
    fn table(&self) -> Box<dyn Table + '_> {
        (**self).table()
    }

    fn sql_type(&self) -> String {
        (**self).sql_type()
    }

    fn non_null(&self) -> bool {
        (**self).non_null()
    }

    fn value(&self) -> Param {
        (**self).value()
    }
}

impl<T: Column + ?Sized> Column for Box<T> {
    fn table(&self) -> Box<dyn Table + '_> {
        (**self).table()
    }

    fn sql_type(&self) -> String {
        (**self).sql_type()
    }

    fn non_null(&self) -> bool {
        (**self).non_null()
    }

    fn value(&self) -> Param {
        (**self).value()
    }
}

impl<T: Table + ?Sized> Table for &T {
    fn columns(&self) -> Vec<Box<dyn Column + '_>> {
        (**self).columns()
    }

    fn constraints(&self) -> Vec<Box<dyn Constrainer + '_>> {
        (**self).constraints()
    }
}

impl<T: Table + ?Sized> Table for Box<T> {
    fn columns(&self) -> Vec<Box<dyn Column + '_>> {
        (**self).columns()
    }

    fn constraints(&self) -> Vec<Box<dyn Constrainer + '_>> {
        (**self).constraints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_type_round_trips_catalog_spelling() {
        for t in [
            ConstraintType::Unique,
            ConstraintType::Check,
            ConstraintType::PrimaryKey,
            ConstraintType::ForeignKey,
        ] {
            assert_eq!(ConstraintType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ConstraintType::parse("EXCLUDE"), None);
        assert_eq!(ConstraintType::ForeignKey.to_string(), "FOREIGN KEY");
    }
}
