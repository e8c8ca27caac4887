//! Applies or reverts a single migration.
//!
//! Where the dialect supports transactional DDL, the migration body and its
//! version-row write share one transaction: either both land or neither
//! does. On MySQL, or when a unit opts out, the body runs on its own and the
//! version row is written afterwards.

use std::time::Instant;

use tracing::{info, warn};

use crate::adapter::Adapter;
use crate::error::MigrateResult;
use crate::file::MigrationFile;
use crate::history::VersionStore;
use crate::migration::{Migration, MigrationLoader, SchemaContext};

/// Which way a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply.
    Up,
    /// Revert.
    Down,
}

impl Direction {
    fn verb(&self) -> &'static str {
        match self {
            Self::Up => "apply",
            Self::Down => "revert",
        }
    }
}

/// Runs migration units against one adapter.
pub struct Executor<'a> {
    adapter: &'a dyn Adapter,
    loader: &'a MigrationLoader,
    versions: VersionStore<'a>,
    warn_on_non_transactional: bool,
}

impl<'a> Executor<'a> {
    /// Create an executor recording into `table`.
    pub fn new(adapter: &'a dyn Adapter, loader: &'a MigrationLoader, table: &'a str) -> Self {
        Self {
            adapter,
            loader,
            versions: VersionStore::new(adapter, table),
            warn_on_non_transactional: true,
        }
    }

    /// Toggle the warning for migrations that run outside a transaction.
    pub fn warn_on_non_transactional(mut self, warn: bool) -> Self {
        self.warn_on_non_transactional = warn;
        self
    }

    /// Apply `file` and record its version.
    pub async fn run_up(&self, file: &MigrationFile) -> MigrateResult<()> {
        self.run(file, Direction::Up).await
    }

    /// Revert `file` and remove its version.
    pub async fn run_down(&self, file: &MigrationFile) -> MigrateResult<()> {
        self.run(file, Direction::Down).await
    }

    async fn run(&self, file: &MigrationFile, direction: Direction) -> MigrateResult<()> {
        let unit = self.loader.load(file).await?;
        let transactional =
            !unit.disable_ddl_transaction() && self.adapter.dialect().supports_ddl_transactions();
        let started = Instant::now();

        if transactional {
            self.run_transactional(unit.as_ref(), file, direction).await?;
        } else {
            if self.warn_on_non_transactional && !unit.disable_ddl_transaction() {
                warn!(
                    file = %file.filename,
                    dialect = %self.adapter.dialect(),
                    "Running migration without a transaction; a failure may leave the schema partially changed"
                );
            }
            self.run_body(unit.as_ref(), direction).await?;
            self.write_version(file, direction).await?;
        }

        info!(
            file = %file.filename,
            direction = direction.verb(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Migration finished"
        );
        Ok(())
    }

    async fn run_transactional(
        &self,
        unit: &dyn Migration,
        file: &MigrationFile,
        direction: Direction,
    ) -> MigrateResult<()> {
        self.adapter.begin().await?;

        let result = async {
            self.run_body(unit, direction).await?;
            self.write_version(file, direction).await
        }
        .await;

        match result {
            Ok(()) => self.adapter.commit().await,
            Err(e) => {
                if let Err(rollback_err) = self.adapter.rollback().await {
                    warn!(file = %file.filename, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn run_body(&self, unit: &dyn Migration, direction: Direction) -> MigrateResult<()> {
        let schema = SchemaContext::new(self.adapter);
        match direction {
            Direction::Up => unit.up(&schema).await,
            Direction::Down => unit.down(&schema).await,
        }
    }

    async fn write_version(&self, file: &MigrationFile, direction: Direction) -> MigrateResult<()> {
        match direction {
            Direction::Up => self.versions.record_version(&file.version, &file.name).await,
            Direction::Down => self.versions.remove_version(&file.version).await,
        }
    }
}
