//! # hakumi-migrate
//!
//! Versioned schema migrations with drift detection.
//!
//! This crate provides:
//! - Timestamped migration files, written in Rust or plain SQL
//! - A schema DSL rendered to PostgreSQL, MySQL or SQLite DDL
//! - Version tracking in a `hakumi_migrations` table
//! - Transactional apply and rollback where the database allows it
//! - A cross-process advisory lock around every mutating run
//! - A stored schema fingerprint to detect changes made outside migrations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ db/migrate/  │────▶│ MigrationLoader│────▶│  Executor   │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                                                    │
//!                              ┌─────────────────────┤
//!                              ▼                     ▼
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ SchemaContext  │     │ VersionStore│
//!                      └────────────────┘     └─────────────┘
//!                              │
//!                              ▼
//!                      ┌────────────────┐
//!                      │    Adapter     │
//!                      └────────────────┘
//! ```
//!
//! The database is reached only through the [`Adapter`] trait; drivers live
//! in their own crates.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hakumi_migrate::{
//!     MigrateResult, Migration, MigrationConfig, MigrationEngine, MigrationRegistry,
//!     SchemaContext,
//! };
//!
//! #[derive(Default)]
//! struct CreateUsers;
//!
//! #[async_trait::async_trait]
//! impl Migration for CreateUsers {
//!     async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
//!         schema
//!             .create_table("users", |t| {
//!                 t.string("name");
//!             })
//!             .await
//!     }
//!
//!     async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
//!         schema.drop_table("users").await
//!     }
//! }
//!
//! async fn run(adapter: impl hakumi_migrate::Adapter) -> MigrateResult<()> {
//!     let mut registry = MigrationRegistry::new();
//!     registry.register_unit::<CreateUsers>("20240101000000")?;
//!
//!     let engine = MigrationEngine::new(adapter, MigrationConfig::from_env())
//!         .with_registry(registry);
//!     let applied = engine.migrate().await?;
//!     println!("Applied {} migrations", applied.len());
//!
//!     engine.update_fingerprint().await?;
//!     engine.drift_checker().verify().await
//! }
//! ```
//!
//! ## Migration Files
//!
//! ```text
//! db/migrate/
//! ├── 20240101000000_create_users.rs
//! └── 20240102000000_add_posts.sql
//! ```
//!
//! SQL files split their sections with `-- migrate:up` and `-- migrate:down`
//! markers. A `-- migrate:no-transaction` line opts the file out of the
//! wrapping transaction.

pub mod adapter;
pub mod config;
pub mod dialect;
pub mod drift;
pub mod engine;
pub mod error;
pub mod executor;
pub mod file;
pub mod fingerprint;
pub mod history;
pub mod introspect;
pub mod lock;
pub mod migration;
pub mod schema;
pub mod sql;

// Re-exports
pub use adapter::{Adapter, Row, SqlValue};
pub use config::{ALLOW_DRIFT_ENV, DriftPolicy, MigrationConfig};
pub use dialect::Dialect;
pub use drift::{DriftChecker, DriftIssue, Reporter};
pub use engine::{MigrationEngine, MigrationState, MigrationStatus};
pub use error::{MigrateResult, MigrationError};
pub use executor::{Direction, Executor};
pub use file::{MigrationFile, MigrationGenerator, MigrationKind};
pub use fingerprint::{FingerprintStore, SchemaFingerprint, StoredFingerprint};
pub use history::{AppliedVersion, VersionStore};
pub use introspect::{ColumnSchema, ForeignKeySchema, Introspector, TableSchema};
pub use lock::with_lock;
pub use migration::{
    Migration, MigrationLoader, MigrationRegistry, SchemaContext, SqlFileMigration,
};
pub use schema::{
    ColumnDefinition, ColumnType, DefaultValue, ForeignKeyDefinition, IdType, IndexDefinition,
    OnDelete, TableDefinition,
};
pub use sql::SqlGenerator;
