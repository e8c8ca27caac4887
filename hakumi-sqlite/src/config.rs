//! SQLite configuration.

use std::path::{Path, PathBuf};

use crate::error::{SqliteError, SqliteResult};

/// Environment variable read by [`SqliteConfig::from_env`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// SQLite database configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path (or ":memory:" for in-memory).
    pub path: DatabasePath,
    /// Enforce foreign keys.
    pub foreign_keys: bool,
    /// Switch file databases to write-ahead logging.
    pub wal_mode: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
}

/// Database path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Get the path string for SQLite.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Memory => ":memory:",
            Self::File(path) => path.to_str().unwrap_or(":memory:"),
        }
    }

    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            wal_mode: false,
            busy_timeout_ms: Some(5000),
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Read the database location from `DATABASE_URL`.
    pub fn from_env() -> SqliteResult<Self> {
        let url = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| SqliteError::config(format!("{} is not set", DATABASE_URL_ENV)))?;
        Self::from_url(url)
    }

    /// Parse a SQLite URL into configuration.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` - In-memory database
    /// - `sqlite://path/to/db.sqlite` - File-based database
    /// - `sqlite:///absolute/path/db.sqlite` - Absolute path
    /// - `file:path/to/db.sqlite` - Alternative format
    ///
    /// `foreign_keys`, `wal_mode` and `busy_timeout` query parameters are
    /// honoured; others are ignored.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url_str = url.as_ref();
        if url_str == "sqlite::memory:" || url_str == ":memory:" {
            return Ok(Self::memory());
        }

        let (location, query) = match url_str.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url_str, None),
        };

        let path = if let Some(path) = location.strip_prefix("sqlite://") {
            path
        } else if let Some(path) = location.strip_prefix("sqlite:") {
            path
        } else if let Some(path) = location.strip_prefix("file:") {
            path
        } else if location.contains("://") {
            return Err(SqliteError::config(format!(
                "'{}' is not a SQLite URL",
                url_str
            )));
        } else {
            location
        };

        if path.is_empty() {
            return Err(SqliteError::config("database path is required"));
        }

        let mut config = if path == ":memory:" {
            Self::memory()
        } else {
            Self::file(path)
        };

        let pairs = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter_map(|pair| pair.split_once('='));
        for (key, value) in pairs {
            match key {
                "mode" if value == "memory" => config.path = DatabasePath::Memory,
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "wal_mode" => config.wal_mode = value == "true" || value == "1",
                "busy_timeout" => {
                    if let Ok(ms) = value.parse() {
                        config.busy_timeout_ms = Some(ms);
                    }
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Get the path string for SQLite.
    pub fn path_str(&self) -> &str {
        self.path.as_str()
    }

    /// Enable or disable foreign keys.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Enable or disable WAL mode.
    pub fn wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Set the busy timeout in milliseconds.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_memory() {
        let config = SqliteConfig::memory();
        assert!(config.path.is_memory());
        assert_eq!(config.path_str(), ":memory:");
        assert!(config.foreign_keys);
    }

    #[test]
    fn test_config_from_url() {
        assert!(SqliteConfig::from_url("sqlite::memory:").unwrap().path.is_memory());
        assert!(SqliteConfig::from_url("sqlite::memory:?foreign_keys=0").unwrap().path.is_memory());

        let config = SqliteConfig::from_url("sqlite://./test.db").unwrap();
        assert_eq!(config.path_str(), "./test.db");

        let config = SqliteConfig::from_url("file:data/app.sqlite3").unwrap();
        assert_eq!(config.path_str(), "data/app.sqlite3");
    }

    #[test]
    fn test_config_from_url_with_options() {
        let config =
            SqliteConfig::from_url("sqlite://./test.db?foreign_keys=false&busy_timeout=10000&wal_mode=1")
                .unwrap();

        assert!(!config.foreign_keys);
        assert!(config.wal_mode);
        assert_eq!(config.busy_timeout_ms, Some(10000));
    }

    #[test]
    fn test_config_from_url_rejects_other_schemes() {
        assert!(matches!(
            SqliteConfig::from_url("postgres://localhost/app"),
            Err(SqliteError::Config(_))
        ));
        assert!(matches!(
            SqliteConfig::from_url("sqlite://"),
            Err(SqliteError::Config(_))
        ));
    }

    #[test]
    fn test_builder_pattern() {
        let config = SqliteConfig::file("app.db")
            .foreign_keys(false)
            .wal_mode(true)
            .busy_timeout(3000);

        assert!(!config.foreign_keys);
        assert!(config.wal_mode);
        assert_eq!(config.busy_timeout_ms, Some(3000));
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("app.db")));
    }
}
