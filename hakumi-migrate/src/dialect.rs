//! SQL dialect capabilities.
//!
//! A [`Dialect`] describes everything the compiler and the engine need to know
//! about a database engine: how identifiers are quoted, how bind parameters
//! are spelled, which column types exist, whether DDL can be rolled back and
//! whether a server-side advisory lock is available.

use std::fmt;
use std::str::FromStr;

use crate::error::{MigrateResult, MigrationError};
use crate::schema::ColumnType;

/// Key passed to `pg_advisory_lock` while a migration batch runs.
pub const MIGRATION_LOCK_KEY: i64 = 7_242_514_623_093;

/// Lock name passed to MySQL `GET_LOCK` while a migration batch runs.
pub const MIGRATION_LOCK_NAME: &str = "hakumi_migrations";

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// All dialects, in a stable order.
    pub const ALL: [Dialect; 3] = [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite];

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::Sqlite => "SQLite",
        }
    }

    /// Whether `INSERT ... RETURNING` is available.
    pub fn supports_returning(&self) -> bool {
        match self {
            Self::Postgres | Self::Sqlite => true,
            Self::MySql => false,
        }
    }

    /// Whether schema changes participate in transactions.
    ///
    /// MySQL commits implicitly around every DDL statement.
    pub fn supports_ddl_transactions(&self) -> bool {
        match self {
            Self::Postgres | Self::Sqlite => true,
            Self::MySql => false,
        }
    }

    /// Whether a server-side named lock exists.
    pub fn supports_advisory_lock(&self) -> bool {
        match self {
            Self::Postgres | Self::MySql => true,
            Self::Sqlite => false,
        }
    }

    /// Maximum identifier length, if the engine enforces one.
    pub fn identifier_limit(&self) -> Option<usize> {
        match self {
            Self::Postgres => Some(63),
            Self::MySql => Some(64),
            Self::Sqlite => None,
        }
    }

    /// Base type name for a column type, or `None` when the dialect has no such type.
    ///
    /// Length, precision and scale modifiers are applied by the compiler.
    pub fn type_name(&self, ty: ColumnType) -> Option<&'static str> {
        use ColumnType::*;

        let name = match self {
            Self::Postgres => match ty {
                String => "varchar",
                Text => "text",
                Integer => "integer",
                Bigint => "bigint",
                Float => "double precision",
                Decimal => "decimal",
                Boolean => "boolean",
                Date => "date",
                Datetime | Timestamp => "timestamp",
                Binary => "bytea",
                Json => "json",
                Jsonb => "jsonb",
                Uuid => "uuid",
                Inet => "inet",
                Cidr => "cidr",
                Hstore => "hstore",
                IntegerArray => "integer[]",
                StringArray => "varchar[]",
                FloatArray => "double precision[]",
                BooleanArray => "boolean[]",
            },
            Self::MySql => match ty {
                String => "varchar",
                Text => "text",
                Integer => "int",
                Bigint => "bigint",
                Float => "double",
                Decimal => "decimal",
                Boolean => "tinyint(1)",
                Date => "date",
                Datetime => "datetime",
                Timestamp => "timestamp",
                Binary => "blob",
                Json | Jsonb | Hstore => "json",
                Uuid => "char(36)",
                Inet | Cidr => "varchar(45)",
                IntegerArray | StringArray | FloatArray | BooleanArray => return None,
            },
            Self::Sqlite => match ty {
                String => "varchar",
                Text => "text",
                Integer => "integer",
                Bigint => "bigint",
                Float => "real",
                Decimal => "decimal",
                Boolean => "boolean",
                Date => "date",
                Datetime | Timestamp => "datetime",
                Binary => "blob",
                Json | Jsonb | Uuid | Inet | Cidr | Hstore => "text",
                IntegerArray | StringArray | FloatArray | BooleanArray => return None,
            },
        };

        Some(name)
    }

    /// Quote an identifier, doubling any embedded quote characters.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", name.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Bind parameter placeholder for the 1-based `index`.
    pub fn bind_marker(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Literal spelling of a boolean default.
    pub fn boolean_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Postgres, true) => "TRUE",
            (Self::Postgres, false) => "FALSE",
            (Self::MySql | Self::Sqlite, true) => "1",
            (Self::MySql | Self::Sqlite, false) => "0",
        }
    }

    /// Statement that blocks until the migration lock is granted.
    pub fn advisory_lock_statement(&self) -> MigrateResult<String> {
        match self {
            Self::Postgres => Ok(format!("SELECT pg_advisory_lock({})", MIGRATION_LOCK_KEY)),
            Self::MySql => Ok(format!("SELECT GET_LOCK('{}', -1)", MIGRATION_LOCK_NAME)),
            Self::Sqlite => Err(MigrationError::unsupported("Advisory locks", self.name())),
        }
    }

    /// Statement that releases the migration lock.
    pub fn advisory_unlock_statement(&self) -> MigrateResult<String> {
        match self {
            Self::Postgres => Ok(format!("SELECT pg_advisory_unlock({})", MIGRATION_LOCK_KEY)),
            Self::MySql => Ok(format!("SELECT RELEASE_LOCK('{}')", MIGRATION_LOCK_NAME)),
            Self::Sqlite => Err(MigrationError::unsupported("Advisory locks", self.name())),
        }
    }

    /// Reject identifiers longer than the dialect allows.
    pub fn check_identifier(&self, name: &str) -> MigrateResult<()> {
        if let Some(limit) = self.identifier_limit() {
            let length = name.chars().count();
            if length > limit {
                return Err(MigrationError::IdentifierTooLong {
                    name: name.to_string(),
                    length,
                    limit,
                    dialect: self.name(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(MigrationError::config(format!("unknown dialect '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::Postgres.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::MySql.quote_identifier("users"), "`users`");
        assert_eq!(Dialect::Sqlite.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::MySql.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_bind_marker() {
        assert_eq!(Dialect::Postgres.bind_marker(1), "$1");
        assert_eq!(Dialect::Postgres.bind_marker(3), "$3");
        assert_eq!(Dialect::MySql.bind_marker(2), "?");
        assert_eq!(Dialect::Sqlite.bind_marker(2), "?");
    }

    #[test]
    fn test_capabilities() {
        assert!(Dialect::Postgres.supports_ddl_transactions());
        assert!(!Dialect::MySql.supports_ddl_transactions());
        assert!(Dialect::Sqlite.supports_ddl_transactions());

        assert!(Dialect::Postgres.supports_advisory_lock());
        assert!(Dialect::MySql.supports_advisory_lock());
        assert!(!Dialect::Sqlite.supports_advisory_lock());

        assert_eq!(Dialect::Postgres.identifier_limit(), Some(63));
        assert_eq!(Dialect::MySql.identifier_limit(), Some(64));
        assert_eq!(Dialect::Sqlite.identifier_limit(), None);
    }

    #[test]
    fn test_array_types_only_on_postgres() {
        for ty in [
            ColumnType::IntegerArray,
            ColumnType::StringArray,
            ColumnType::FloatArray,
            ColumnType::BooleanArray,
        ] {
            assert!(Dialect::Postgres.type_name(ty).is_some());
            assert!(Dialect::MySql.type_name(ty).is_none());
            assert!(Dialect::Sqlite.type_name(ty).is_none());
        }
    }

    #[test]
    fn test_lock_statements() {
        assert!(
            Dialect::Postgres
                .advisory_lock_statement()
                .unwrap()
                .starts_with("SELECT pg_advisory_lock(")
        );
        assert!(
            Dialect::MySql
                .advisory_unlock_statement()
                .unwrap()
                .contains("RELEASE_LOCK('hakumi_migrations')")
        );
        assert!(matches!(
            Dialect::Sqlite.advisory_lock_statement(),
            Err(MigrationError::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_check_identifier_boundary() {
        let ok = "a".repeat(63);
        let too_long = "a".repeat(64);
        assert!(Dialect::Postgres.check_identifier(&ok).is_ok());
        assert!(Dialect::Postgres.check_identifier(&too_long).is_err());
        assert!(Dialect::MySql.check_identifier(&too_long).is_ok());
        assert!(Dialect::Sqlite.check_identifier(&"a".repeat(500)).is_ok());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("sqlite3".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
