//! Applied-version bookkeeping.
//!
//! One row per applied migration in `hakumi_migrations` (the name is
//! configurable). Rows are written only by the executor while the migration
//! lock is held. Every value goes through a bind parameter.

use std::collections::BTreeSet;

use tracing::debug;

use crate::adapter::{Adapter, SqlValue};
use crate::error::{MigrateResult, MigrationError};

/// A row of the version table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedVersion {
    /// 14-digit version.
    pub version: String,
    /// Logical migration name.
    pub name: String,
    /// When it was applied, as reported by the database.
    pub migrated_at: Option<String>,
}

/// Reads and writes the version table through an adapter.
pub struct VersionStore<'a> {
    adapter: &'a dyn Adapter,
    table: &'a str,
}

impl<'a> VersionStore<'a> {
    /// Create a store over `table`.
    pub fn new(adapter: &'a dyn Adapter, table: &'a str) -> Self {
        Self { adapter, table }
    }

    fn quoted_table(&self) -> String {
        self.adapter.dialect().quote_identifier(self.table)
    }

    fn marker(&self, index: usize) -> String {
        self.adapter.dialect().bind_marker(index)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the version table.
    pub fn create_table_sql(&self) -> String {
        let dialect = self.adapter.dialect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(14) PRIMARY KEY, {} VARCHAR(255) NOT NULL, {} TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            self.quoted_table(),
            dialect.quote_identifier("version"),
            dialect.quote_identifier("name"),
            dialect.quote_identifier("migrated_at"),
        )
    }

    /// Create the version table if it does not exist.
    pub async fn ensure_table(&self) -> MigrateResult<()> {
        self.adapter.dialect().check_identifier(self.table)?;
        self.adapter.exec(&self.create_table_sql()).await
    }

    /// Applied versions.
    pub async fn applied_versions(&self) -> MigrateResult<BTreeSet<String>> {
        Ok(self
            .applied()
            .await?
            .into_iter()
            .map(|row| row.version)
            .collect())
    }

    /// Applied rows, ascending by version.
    pub async fn applied(&self) -> MigrateResult<Vec<AppliedVersion>> {
        let sql = format!(
            "SELECT version, name, migrated_at FROM {} ORDER BY version",
            self.quoted_table()
        );
        let rows = self.adapter.query(&sql, &[]).await?;

        rows.iter()
            .map(|row| {
                let version = row
                    .get("version")
                    .map(ToString::to_string)
                    .ok_or_else(|| MigrationError::database("version table row without a version"))?;
                Ok(AppliedVersion {
                    version,
                    name: row.get_str("name").unwrap_or_default().to_string(),
                    migrated_at: row
                        .get("migrated_at")
                        .filter(|v| !v.is_null())
                        .map(ToString::to_string),
                })
            })
            .collect()
    }

    /// Highest applied version.
    pub async fn current_version(&self) -> MigrateResult<Option<String>> {
        Ok(self.applied_versions().await?.into_iter().next_back())
    }

    /// Insert a version row.
    pub async fn record_version(&self, version: &str, name: &str) -> MigrateResult<()> {
        let sql = format!(
            "INSERT INTO {} (version, name) VALUES ({}, {})",
            self.quoted_table(),
            self.marker(1),
            self.marker(2)
        );
        self.adapter
            .exec_params(&sql, &[SqlValue::from(version), SqlValue::from(name)])
            .await?;
        debug!(version, "Recorded migration version");
        Ok(())
    }

    /// Delete a version row.
    pub async fn remove_version(&self, version: &str) -> MigrateResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE version = {}",
            self.quoted_table(),
            self.marker(1)
        );
        self.adapter
            .exec_params(&sql, &[SqlValue::from(version)])
            .await?;
        debug!(version, "Removed migration version");
        Ok(())
    }
}
