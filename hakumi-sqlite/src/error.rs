//! Error types for SQLite operations.

use hakumi_migrate::MigrationError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for MigrationError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Sqlite(e) => MigrationError::database(e.to_string()),
            SqliteError::Config(msg) => MigrationError::config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqliteError::config("database path is required");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("database path is required"));
    }

    #[test]
    fn test_error_conversion() {
        let err: MigrationError = SqliteError::from(rusqlite::Error::QueryReturnedNoRows).into();
        assert!(matches!(err, MigrationError::Database(_)));

        let err: MigrationError = SqliteError::config("bad url").into();
        assert!(matches!(err, MigrationError::Config(_)));
    }
}
