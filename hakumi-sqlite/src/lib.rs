//! SQLite adapter for the Hakumi migration engine.
//!
//! This crate connects [`hakumi_migrate`] to SQLite using `tokio-rusqlite`
//! for asynchronous database access.
//!
//! # Example
//!
//! ```rust,ignore
//! use hakumi_migrate::{MigrationConfig, MigrationEngine};
//! use hakumi_sqlite::SqliteAdapter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = SqliteAdapter::from_url("sqlite://./db/development.sqlite3").await?;
//!     let engine = MigrationEngine::new(adapter, MigrationConfig::from_env());
//!     engine.migrate().await?;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod types;

pub use adapter::SqliteAdapter;
pub use config::{DATABASE_URL_ENV, DatabasePath, SqliteConfig};
pub use error::{SqliteError, SqliteResult};
