//! [`Adapter`] implementation over a single SQLite connection.

use std::time::Duration;

use async_trait::async_trait;
use hakumi_migrate::{Adapter, Dialect, MigrateResult, Row, SqlValue};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types;

/// A SQLite connection the migration engine can drive.
///
/// All calls run on the connection's background thread, one at a time, so
/// `begin`/`commit` bracket everything issued in between.
pub struct SqliteAdapter {
    conn: Connection,
    config: SqliteConfig,
}

impl SqliteAdapter {
    /// Open a database and apply the configured pragmas.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };

        let foreign_keys = config.foreign_keys;
        let wal_mode = config.wal_mode && !config.path.is_memory();
        let busy_timeout = config.busy_timeout_ms;
        conn.call(move |conn| {
            conn.pragma_update(None, "foreign_keys", foreign_keys)?;
            if let Some(ms) = busy_timeout {
                conn.busy_timeout(Duration::from_millis(u64::from(ms)))?;
            }
            if wal_mode {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
            }
            Ok(())
        })
        .await?;

        info!(path = config.path_str(), "Opened SQLite database");
        Ok(Self { conn, config })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// Open the database named by a SQLite URL.
    pub async fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// The configuration the database was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn batch(&self, sql: &str) -> SqliteResult<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| Ok(conn.execute_batch(&sql)?))
            .await
            .map_err(SqliteError::from)
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn exec(&self, sql: &str) -> MigrateResult<()> {
        debug!(sql = %sql, "Executing statement");
        Ok(self.batch(sql).await?)
    }

    async fn exec_params(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        debug!(sql = %sql, "Executing parameterized statement");
        let sql = sql.to_string();
        let values: Vec<_> = params.iter().map(types::to_sqlite_value).collect();

        let affected = self
            .conn
            .call(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?))
            .await
            .map_err(SqliteError::from)?;
        Ok(affected as u64)
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");
        let sql = sql.to_string();
        let values: Vec<_> = params.iter().map(types::to_sqlite_value).collect();

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> = stmt
                    .column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();

                let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
                    types::read_row(row, &columns)
                })?;

                let results: Result<Vec<_>, _> = rows.collect();
                Ok(results?)
            })
            .await
            .map_err(SqliteError::from)?;
        Ok(rows)
    }

    async fn begin(&self) -> MigrateResult<()> {
        Ok(self.batch("BEGIN").await?)
    }

    async fn commit(&self) -> MigrateResult<()> {
        Ok(self.batch("COMMIT").await?)
    }

    async fn rollback(&self) -> MigrateResult<()> {
        Ok(self.batch("ROLLBACK").await?)
    }
}
