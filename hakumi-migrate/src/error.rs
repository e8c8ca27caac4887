//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while compiling DDL, running migrations or checking drift.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Unknown column type symbol.
    #[error("Invalid column type '{0}'")]
    InvalidColumnType(String),

    /// Operation not available on the current dialect.
    #[error("{feature} is not supported by {dialect}")]
    UnsupportedFeature {
        /// What was attempted.
        feature: String,
        /// Dialect name.
        dialect: &'static str,
    },

    /// A synthesized or explicit identifier exceeds the dialect limit.
    #[error(
        "Identifier '{name}' is {length} characters long, exceeding the {dialect} limit of {limit}; \
         pass an explicit shorter name"
    )]
    IdentifierTooLong {
        /// The offending identifier.
        name: String,
        /// Its length in characters.
        length: usize,
        /// The dialect limit.
        limit: usize,
        /// Dialect name.
        dialect: &'static str,
    },

    /// Migration name does not follow the naming rules.
    #[error("Invalid migration name '{name}': {reason}")]
    InvalidMigrationName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A migration with this name or version already exists.
    #[error("Duplicate migration '{name}': already defined by {existing}")]
    DuplicateMigration {
        /// The colliding name or version.
        name: String,
        /// The file that already claims it.
        existing: String,
    },

    /// A migration file could not be resolved to an executable unit.
    #[error("Failed to load migration '{file}': {reason}")]
    MigrationLoadFailure {
        /// Migration filename.
        file: String,
        /// Failure detail.
        reason: String,
    },

    /// The live schema fingerprint differs from the stored one.
    #[error(
        "Schema drift detected: expected fingerprint {expected}, found {actual}. \
         Set HAKUMI_ALLOW_SCHEMA_DRIFT to continue anyway"
    )]
    SchemaDriftDetected {
        /// Prefix of the stored digest.
        expected: String,
        /// Prefix of the live digest.
        actual: String,
    },

    /// Migrations exist on disk that have not been applied.
    #[error("{} pending migration(s): {}", .0.len(), .0.join(", "))]
    PendingMigrations(Vec<String>),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation error reported by the adapter.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>, dialect: &'static str) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            dialect,
        }
    }

    /// Create an invalid migration name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMigrationName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a migration load failure.
    pub fn load_failure(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MigrationLoadFailure {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Check whether this error was raised while compiling DDL, before any SQL ran.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidColumnType(_) | Self::UnsupportedFeature { .. } | Self::IdentifierTooLong { .. }
        )
    }
}
