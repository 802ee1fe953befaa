//! Structural model produced by a reversal pass.
//!
//! The types deserialize straight from the aggregate JSON document the catalog
//! query returns. They also implement the capability traits of
//! [`crate::table`] through borrowed views, so a reversed table can be handed
//! to the CRUD builder like any hand-written one.

use crate::error::{TabuaError, TabuaResult};
use crate::param::Param;
use crate::table::{
    self as cap, CheckConstrainer, Constrainer, ConstraintType, Fk, FkConstrainer, Namer,
    PkConstrainer, UniqueConstrainer,
};
use crate::typemap::{TargetType, resolve_column_type};
use serde::{Deserialize, Deserializer, Serialize};

/// Default schema scanned by a reversal pass.
pub const DEFAULT_SCHEMA: &str = "public";

/// A reversed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub columns: Vec<Column>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A reversed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub udt_name: String,
    pub non_null: bool,
    pub data_type: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Array dimensions; 0 for scalars.
    #[serde(default)]
    pub dimension: i32,
}

/// A reversed constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub definition: String,
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub columns_local: Vec<ConstraintColumn>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub columns_foreign: Vec<ConstraintColumn>,
}

/// A column referenced by a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintColumn {
    pub table: String,
    pub column: String,
}

/// Scope of a reversal pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub schema: String,
    /// Table allow-list; `None` keeps every table of the schema.
    pub tables: Option<Vec<String>>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            tables: None,
        }
    }
}

impl Filter {
    /// Scan `schema` without an allow-list.
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            tables: None,
        }
    }

    /// Restrict the pass to the given tables.
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict the pass to a comma-separated list of tables.
    ///
    /// Blank segments are dropped; a list with no names leaves the filter open.
    pub fn with_tables_csv(self, csv: &str) -> Self {
        let tables = split_csv(csv);
        if tables.is_empty() {
            return self;
        }
        self.with_tables(tables)
    }
}

/// Split a comma-separated name list, trimming names and dropping blanks.
pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl Table {
    /// Find a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key constraint, if the table has one.
    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|c| c.constraint_type == ConstraintType::PrimaryKey)
    }

    /// Foreign key constraints in catalog order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.constraint_type == ConstraintType::ForeignKey)
    }
}

impl Column {
    /// `"<udt_name>,<data_type>"`
    pub fn sql_type(&self) -> String {
        format!("{},{}", self.udt_name, self.data_type)
    }

    /// Array dimensions as a count; negative catalog values count as scalar.
    pub fn dimensions(&self) -> usize {
        usize::try_from(self.dimension).unwrap_or(0)
    }

    /// Resolve the target type, retrying with `data_type` when `udt_name` is
    /// not recognized.
    pub fn target_type(&self) -> (TargetType, bool) {
        resolve_column_type(
            &self.udt_name,
            &self.data_type,
            self.dimensions(),
            self.non_null,
        )
    }
}

impl Constraint {
    /// Check the column-reference invariant for this constraint kind.
    pub fn validate(&self) -> TabuaResult<()> {
        match self.constraint_type {
            ConstraintType::ForeignKey => {
                if self.columns_local.is_empty() || self.columns_foreign.is_empty() {
                    return Err(TabuaError::column_validation(
                        &self.name,
                        "foreign key must reference local and foreign columns",
                    ));
                }
                if self.columns_local.len() != self.columns_foreign.len() {
                    return Err(TabuaError::column_validation(
                        &self.name,
                        format!(
                            "foreign key pairs {} local with {} foreign columns",
                            self.columns_local.len(),
                            self.columns_foreign.len()
                        ),
                    ));
                }
            }
            _ => {
                if !self.columns_foreign.is_empty() {
                    return Err(TabuaError::column_validation(
                        &self.name,
                        format!("{} constraint has foreign columns", self.constraint_type),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Namer for Table {
    fn name(&self) -> &str {
        &self.name
    }
}

impl cap::Table for Table {
    fn columns(&self) -> Vec<Box<dyn cap::Column + '_>> {
        self.columns
            .iter()
            .map(|column| Box::new(ColumnView { table: self, column }) as Box<dyn cap::Column + '_>)
            .collect()
    }

    fn constraints(&self) -> Vec<Box<dyn Constrainer + '_>> {
        self.constraints
            .iter()
            .map(|constraint| {
                Box::new(ConstraintView {
                    table: self,
                    constraint,
                }) as Box<dyn Constrainer + '_>
            })
            .collect()
    }
}

/// A reversed column seen through the [`cap::Column`] capability.
///
/// Structural views carry no value; they bind SQL `NULL`.
#[derive(Debug, Clone, Copy)]
pub struct ColumnView<'a> {
    pub table: &'a Table,
    pub column: &'a Column,
}

impl Namer for ColumnView<'_> {
    fn name(&self) -> &str {
        &self.column.name
    }
}

impl cap::Column for ColumnView<'_> {
    fn table(&self) -> Box<dyn cap::Table + '_> {
        Box::new(self.table)
    }

    fn sql_type(&self) -> String {
        self.column.sql_type()
    }

    fn non_null(&self) -> bool {
        self.column.non_null
    }

    fn value(&self) -> Param {
        Param::null()
    }
}

/// A column of another table, known only by name.
#[derive(Debug, Clone, Copy)]
pub struct ReferencedColumn<'a> {
    pub reference: &'a ConstraintColumn,
}

/// A table known only by name.
#[derive(Debug, Clone, Copy)]
pub struct ReferencedTable<'a> {
    pub name: &'a str,
}

impl Namer for ReferencedTable<'_> {
    fn name(&self) -> &str {
        self.name
    }
}

impl cap::Table for ReferencedTable<'_> {
    fn columns(&self) -> Vec<Box<dyn cap::Column + '_>> {
        Vec::new()
    }

    fn constraints(&self) -> Vec<Box<dyn Constrainer + '_>> {
        Vec::new()
    }
}

impl Namer for ReferencedColumn<'_> {
    fn name(&self) -> &str {
        &self.reference.column
    }
}

impl cap::Column for ReferencedColumn<'_> {
    fn table(&self) -> Box<dyn cap::Table + '_> {
        Box::new(ReferencedTable {
            name: &self.reference.table,
        })
    }

    fn sql_type(&self) -> String {
        String::new()
    }

    fn non_null(&self) -> bool {
        false
    }

    fn value(&self) -> Param {
        Param::null()
    }
}

/// A reversed constraint seen through the [`Constrainer`] capabilities.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintView<'a> {
    pub table: &'a Table,
    pub constraint: &'a Constraint,
}

impl<'a> ConstraintView<'a> {
    fn local_columns(&self) -> Vec<Box<dyn cap::Column + 'a>> {
        let table = self.table;
        self.constraint
            .columns_local
            .iter()
            .map(|r| match table.column(&r.column) {
                Some(column) if r.table == table.name => {
                    Box::new(ColumnView { table, column }) as Box<dyn cap::Column + 'a>
                }
                _ => Box::new(ReferencedColumn { reference: r }),
            })
            .collect()
    }

    fn foreign_columns(&self) -> Vec<Box<dyn cap::Column + 'a>> {
        self.constraint
            .columns_foreign
            .iter()
            .map(|reference| Box::new(ReferencedColumn { reference }) as Box<dyn cap::Column + 'a>)
            .collect()
    }
}

impl Namer for ConstraintView<'_> {
    fn name(&self) -> &str {
        &self.constraint.name
    }
}

impl Constrainer for ConstraintView<'_> {
    fn constraint_type(&self) -> ConstraintType {
        self.constraint.constraint_type
    }

    fn definition(&self) -> String {
        self.constraint.definition.clone()
    }

    fn as_unique(&self) -> Option<&dyn UniqueConstrainer> {
        (self.constraint.constraint_type == ConstraintType::Unique).then_some(self as &dyn UniqueConstrainer)
    }

    fn as_check(&self) -> Option<&dyn CheckConstrainer> {
        (self.constraint.constraint_type == ConstraintType::Check).then_some(self as &dyn CheckConstrainer)
    }

    fn as_primary_key(&self) -> Option<&dyn PkConstrainer> {
        (self.constraint.constraint_type == ConstraintType::PrimaryKey).then_some(self as &dyn PkConstrainer)
    }

    fn as_foreign_key(&self) -> Option<&dyn FkConstrainer> {
        (self.constraint.constraint_type == ConstraintType::ForeignKey).then_some(self as &dyn FkConstrainer)
    }
}

impl UniqueConstrainer for ConstraintView<'_> {
    fn uniques(&self) -> Vec<Box<dyn cap::Column + '_>> {
        self.local_columns()
    }
}

impl CheckConstrainer for ConstraintView<'_> {
    fn check_columns(&self) -> Vec<Box<dyn cap::Column + '_>> {
        self.local_columns()
    }
}

impl PkConstrainer for ConstraintView<'_> {
    fn keys(&self) -> Vec<Box<dyn cap::Column + '_>> {
        self.local_columns()
    }
}

impl FkConstrainer for ConstraintView<'_> {
    fn key(&self) -> Fk<'_> {
        Fk {
            from: self.local_columns(),
            to: self.foreign_columns(),
        }
    }
}
