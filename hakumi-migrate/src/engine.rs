//! The migration runner.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use crate::adapter::Adapter;
use crate::config::MigrationConfig;
use crate::drift::DriftChecker;
use crate::error::MigrateResult;
use crate::executor::Executor;
use crate::file::{self, MigrationFile};
use crate::fingerprint::{self, FingerprintStore, SchemaFingerprint};
use crate::history::{AppliedVersion, VersionStore};
use crate::introspect::Introspector;
use crate::lock;
use crate::migration::{MigrationLoader, MigrationRegistry};

/// Whether a migration has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Applied.
    Up,
    /// Not applied.
    Down,
    /// Applied, but the file is gone.
    FileMissing,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::FileMissing => "up (file missing)",
        })
    }
}

/// One line of `status()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// 14-digit version.
    pub version: String,
    /// Logical name, from the file or the version table.
    pub name: String,
    /// Current state.
    pub state: MigrationState,
    /// When it was applied.
    pub migrated_at: Option<String>,
}

/// Discovers, applies and reverts migrations against one database.
///
/// Every mutating operation runs under the migration lock.
pub struct MigrationEngine<A: Adapter> {
    adapter: A,
    config: MigrationConfig,
    loader: MigrationLoader,
}

impl<A: Adapter> MigrationEngine<A> {
    /// Create an engine with an empty registry.
    pub fn new(adapter: A, config: MigrationConfig) -> Self {
        Self {
            adapter,
            config,
            loader: MigrationLoader::default(),
        }
    }

    /// Use `registry` to resolve Rust migration units.
    pub fn with_registry(mut self, registry: MigrationRegistry) -> Self {
        self.loader = MigrationLoader::new(registry);
        self
    }

    /// The adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    fn versions(&self) -> VersionStore<'_> {
        VersionStore::new(&self.adapter, &self.config.table_name)
    }

    fn executor(&self) -> Executor<'_> {
        Executor::new(&self.adapter, &self.loader, &self.config.table_name)
            .warn_on_non_transactional(self.config.warn_on_non_transactional)
    }

    async fn discover(&self) -> MigrateResult<Vec<MigrationFile>> {
        file::discover(&self.config.directory).await
    }

    /// Applied rows, or none when the version table does not exist yet.
    async fn applied_rows(&self) -> MigrateResult<Vec<AppliedVersion>> {
        if !Introspector::new(&self.adapter)
            .table_exists(&self.config.table_name)
            .await?
        {
            return Ok(Vec::new());
        }
        self.versions().applied().await
    }

    /// Apply every pending migration in version order.
    ///
    /// Returns the versions applied; empty when the schema was up to date.
    pub async fn migrate(&self) -> MigrateResult<Vec<String>> {
        lock::with_lock(&self.adapter, async {
            let versions = self.versions();
            versions.ensure_table().await?;
            let applied = versions.applied_versions().await?;

            let executor = self.executor();
            let mut done = Vec::new();
            for file in self.discover().await? {
                if applied.contains(&file.version) {
                    continue;
                }
                executor.run_up(&file).await?;
                done.push(file.version);
            }

            if done.is_empty() {
                info!("Schema is up to date");
            } else {
                info!(count = done.len(), "Applied migrations");
            }
            Ok(done)
        })
        .await
    }

    /// Revert the `count` most recently applied migrations, newest first.
    ///
    /// Applied versions whose file no longer exists are skipped with a
    /// warning. Returns the versions reverted.
    pub async fn rollback(&self, count: usize) -> MigrateResult<Vec<String>> {
        lock::with_lock(&self.adapter, async {
            let versions = self.versions();
            versions.ensure_table().await?;
            let applied = versions.applied_versions().await?;

            let files: BTreeMap<String, MigrationFile> = self
                .discover()
                .await?
                .into_iter()
                .map(|f| (f.version.clone(), f))
                .collect();

            let executor = self.executor();
            let mut reverted = Vec::new();
            for version in applied.iter().rev().take(count) {
                let Some(file) = files.get(version) else {
                    warn!(version = %version, "Skipping rollback: migration file not found");
                    continue;
                };
                executor.run_down(file).await?;
                reverted.push(version.clone());
            }

            info!(count = reverted.len(), "Reverted migrations");
            Ok(reverted)
        })
        .await
    }

    /// State of every discovered file plus applied versions without a file.
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatus>> {
        let mut applied: BTreeMap<String, AppliedVersion> = self
            .applied_rows()
            .await?
            .into_iter()
            .map(|row| (row.version.clone(), row))
            .collect();

        let mut statuses: Vec<MigrationStatus> = self
            .discover()
            .await?
            .into_iter()
            .map(|file| {
                let row = applied.remove(&file.version);
                MigrationStatus {
                    state: if row.is_some() {
                        MigrationState::Up
                    } else {
                        MigrationState::Down
                    },
                    migrated_at: row.and_then(|r| r.migrated_at),
                    version: file.version,
                    name: file.name,
                }
            })
            .collect();

        statuses.extend(applied.into_values().map(|row| MigrationStatus {
            version: row.version,
            name: row.name,
            state: MigrationState::FileMissing,
            migrated_at: row.migrated_at,
        }));
        statuses.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(statuses)
    }

    /// Highest applied version.
    pub async fn current_version(&self) -> MigrateResult<Option<String>> {
        Ok(self.applied_rows().await?.into_iter().map(|r| r.version).max())
    }

    /// Files not yet applied, in version order.
    pub async fn pending(&self) -> MigrateResult<Vec<MigrationFile>> {
        fingerprint::pending_migrations(&self.adapter, &self.config).await
    }

    /// Fingerprint the live schema and store it as the expected state.
    pub async fn update_fingerprint(&self) -> MigrateResult<SchemaFingerprint> {
        lock::with_lock(&self.adapter, async {
            let live = fingerprint::live_fingerprint(&self.adapter, &self.config).await?;
            FingerprintStore::new(&self.adapter, &self.config.fingerprint_table)
                .store(&live)
                .await?;
            info!(digest = live.short_digest(), "Updated schema fingerprint");
            Ok(live)
        })
        .await
    }

    /// Drift checker over the same adapter and configuration.
    pub fn drift_checker(&self) -> DriftChecker<'_> {
        DriftChecker::new(&self.adapter, &self.config)
    }
}
