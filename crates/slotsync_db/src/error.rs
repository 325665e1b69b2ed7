//! Error types for the database client

use slotsync_common::{HttpStatusCode, SlotsyncError};
use thiserror::Error;

/// Errors that can occur when working with the database client
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query
    #[error("Database query error: {0}")]
    QueryError(String),

    /// Error with database transaction
    #[error("Database transaction error: {0}")]
    TransactionError(String),

    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored value could not be turned back into a domain value
    #[error("Failed to decode stored value: {0}")]
    DecodeError(String),
}

impl DbError {
    /// Classifies a failed statement, separating uniqueness violations from
    /// every other query failure.
    pub fn from_query(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let message = db_err.message();
            if db_err.is_unique_violation()
                || message.contains("UNIQUE constraint failed")
                || message.contains("duplicate key")
            {
                return DbError::UniqueViolation(message.to_string());
            }
        }
        DbError::QueryError(err.to_string())
    }
}

impl From<DbError> for SlotsyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation(msg) => SlotsyncError::ConflictError(msg),
            DbError::ConfigError(msg) | DbError::UrlError(msg) => SlotsyncError::ConfigError(msg),
            other => SlotsyncError::DatabaseError(other.to_string()),
        }
    }
}

impl HttpStatusCode for DbError {
    fn status_code(&self) -> u16 {
        match self {
            DbError::UniqueViolation(_) => 409,
            _ => 500,
        }
    }
}
