//! Repository Errors
//!
//! Error types for persistence operations.

/// Postgres SQLSTATE for `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

/// Postgres SQLSTATE for `undefined_object` (missing enum type)
const UNDEFINED_OBJECT: &str = "42704";

/// Errors that can occur in a repository
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The schema has not been migrated (table or type missing)
    #[error("Schema not migrated: {0}")]
    SchemaMissing(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl RepositoryError {
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, RepositoryError::SchemaMissing(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code();
            if matches!(code.as_deref(), Some(UNDEFINED_TABLE) | Some(UNDEFINED_OBJECT)) {
                return RepositoryError::SchemaMissing(db_err.message().to_string());
            }
        }
        RepositoryError::Database(err)
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
