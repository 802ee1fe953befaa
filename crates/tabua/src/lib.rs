//! # tabua
//!
//! Reverse a PostgreSQL schema into a structural model and build
//! parameterized statements from column values.
//!
//! ## Reversal
//!
//! One catalog query per pass returns every table of a schema, with columns
//! (nullability, array dimensions, comments) and unique, check, primary key
//! and foreign key constraints:
//!
//! ```ignore
//! use tabua::{Filter, Reverser};
//!
//! let reverser = Reverser::new(client);
//! let tables = reverser.run(&Filter::new("public").with_tables_csv("users,orders")).await?;
//! for column in &tables[0].columns {
//!     println!("{} -> {}", column.name, column.target_type().0);
//! }
//! ```
//!
//! ## Statements
//!
//! The builder works over the [`Column`] and [`Table`] capability traits, so
//! reversed tables, generated code and hand-written types all work:
//!
//! ```ignore
//! use tabua::Crud;
//!
//! let crud = Crud::dollar();
//! let q = crud.upsert(&[&user.id, &user.name], &user.id, &[&user.name])?;
//! client.execute(q.sql(), &q.params_ref()).await?;
//! ```

pub mod client;
pub mod column;
pub mod crud;
pub mod error;
pub mod model;
pub mod ops;
pub mod param;
pub mod reverse;
pub mod table;
pub mod typemap;

pub use client::{CatalogClient, RowExt};
pub use column::{
    Bits, Discard, NullCol, NullMapList, NullStringList, NullStringMap, Numeric, TimeTz, Uuid,
};
pub use crud::{Crud, Placeholder, Query, SelectStmt};
pub use error::{TabuaError, TabuaResult};
pub use model::{DEFAULT_SCHEMA, Filter};
pub use param::{Param, ParamList, SqlNull};
pub use reverse::{CatalogQuery, Reverser, SqlGenerator, decode_tables, sql_from_postgres};
pub use table::{
    CheckConstrainer, Column, Constrainer, ConstraintType, Fk, FkConstrainer, Namer,
    PkConstrainer, Table, UniqueConstrainer,
};
pub use typemap::{TargetType, bind_type, map_type, resolve_column_type};
