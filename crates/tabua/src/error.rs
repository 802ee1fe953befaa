//! Error types for tabua

use thiserror::Error;

/// Result type alias for tabua operations
pub type TabuaResult<T> = Result<T, TabuaError>;

/// SQLSTATE for `insufficient_privilege`.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Error types for reversal and statement building
#[derive(Debug, Error)]
pub enum TabuaError {
    /// A builder precondition was violated (e.g. an empty column list).
    #[error("Error generating query: {0}")]
    QueryGeneration(String),

    /// A column value failed validation.
    #[error("{column}: {message}")]
    ColumnValidation { column: String, message: String },

    /// The reversal query produced no result at all.
    ///
    /// This is distinct from a schema that legitimately has no tables after
    /// filtering, which yields an empty list.
    #[error("No tables: {0}")]
    NoTables(String),

    /// The reversal result was not valid JSON for the structural model.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Driver error, passed through unmodified.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}

impl TabuaError {
    /// Create a query generation error
    pub fn query_generation(message: impl Into<String>) -> Self {
        Self::QueryGeneration(message.into())
    }

    /// Create a column validation error
    pub fn column_validation(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ColumnValidation {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a query generation error
    pub fn is_query_generation(&self) -> bool {
        matches!(self, Self::QueryGeneration(_))
    }

    /// Check if this is the "no tables" condition
    pub fn is_no_tables(&self) -> bool {
        matches!(self, Self::NoTables(_))
    }

    /// Check if the driver rejected the query for lack of privileges.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Database(err) => err
                .as_db_error()
                .is_some_and(|db| db.code().code() == INSUFFICIENT_PRIVILEGE),
            _ => false,
        }
    }

    /// Wrap a tokio_postgres error.
    ///
    /// Permission failures are recognized by [`TabuaError::is_permission_denied`]
    /// but are still reported as [`TabuaError::Database`].
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        Self::Database(err)
    }
}
