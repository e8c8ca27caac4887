//! # Hakumi
//!
//! Schema evolution for the Hakumi database toolkit.
//!
//! Hakumi provides:
//! - A schema DSL compiled to PostgreSQL, MySQL and SQLite DDL
//! - Timestamped migrations written in Rust or plain SQL
//! - Locked, transactional migration runs with version tracking
//! - Schema fingerprints to catch changes made outside migrations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hakumi::prelude::*;
//! use hakumi::sqlite::SqliteAdapter;
//!
//! #[derive(Default)]
//! struct CreateUsers;
//!
//! #[async_trait::async_trait]
//! impl Migration for CreateUsers {
//!     async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
//!         schema
//!             .create_table("users", |t| {
//!                 t.string("name").null(false);
//!                 t.timestamps();
//!             })
//!             .await
//!     }
//!
//!     async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
//!         schema.drop_table("users").await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = MigrationRegistry::new();
//!     registry.register_unit::<CreateUsers>("20240101000000")?;
//!
//!     let adapter = SqliteAdapter::from_url("sqlite://./db/development.sqlite3").await?;
//!     let engine = MigrationEngine::new(adapter, MigrationConfig::from_env())
//!         .with_registry(registry);
//!
//!     engine.migrate().await?;
//!     engine.update_fingerprint().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration engine, schema DSL and drift detection.
pub mod migrate {
    pub use hakumi_migrate::*;
}

/// SQLite adapter.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use hakumi_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Adapter, Dialect, MigrateResult, Migration, MigrationConfig, MigrationEngine,
        MigrationError, MigrationRegistry, SchemaContext,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError};
