//! End-to-end migration runs against an in-memory SQLite database.

use async_trait::async_trait;
use hakumi::migrate::{
    Adapter, MigrateResult, Migration, MigrationConfig, MigrationEngine, MigrationError,
    MigrationGenerator, MigrationKind, MigrationRegistry, MigrationState, SchemaContext,
    VersionStore,
};
use hakumi::sqlite::SqliteAdapter;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[derive(Default)]
struct CreateUsers;

#[async_trait]
impl Migration for CreateUsers {
    async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        schema
            .create_table("users", |t| {
                t.string("name").not_null();
                t.timestamps();
            })
            .await
    }

    async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        schema.drop_table("users").await
    }
}

#[derive(Default)]
struct CreatePosts;

#[async_trait]
impl Migration for CreatePosts {
    async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        schema
            .create_table("posts", |t| {
                t.string("title");
                t.references("user");
            })
            .await
    }

    async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        schema.drop_table("posts").await
    }
}

#[derive(Default)]
struct BrokenMigration;

#[async_trait]
impl Migration for BrokenMigration {
    async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        schema
            .create_table("audits", |t| {
                t.text("entry");
            })
            .await?;
        schema.execute("INSERT INTO missing_table VALUES (1)").await
    }

    async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        schema.drop_table("audits").await
    }
}

fn registry() -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    registry
        .register_unit::<CreateUsers>("20240101000000")
        .unwrap()
        .register_unit::<CreatePosts>("20240102000000")
        .unwrap()
        .register_unit::<BrokenMigration>("20240109000000")
        .unwrap();
    registry
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup() -> (TempDir, MigrationEngine<SqliteAdapter>) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let generator = MigrationGenerator::new(dir.path());
    generator
        .create_with_version("20240101000000", "create_users", MigrationKind::Rust)
        .await
        .unwrap();
    generator
        .create_with_version("20240102000000", "create_posts", MigrationKind::Rust)
        .await
        .unwrap();
    std::fs::write(
        dir.path().join("20240103000000_add_email_to_users.sql"),
        "-- migrate:up\n\
         ALTER TABLE users ADD COLUMN email varchar(255);\n\
         CREATE UNIQUE INDEX idx_users_email ON users (email);\n\
         -- migrate:down\n\
         DROP INDEX idx_users_email;\n\
         ALTER TABLE users DROP COLUMN email;\n",
    )
    .unwrap();

    let adapter = SqliteAdapter::open_in_memory().await.unwrap();
    let engine = MigrationEngine::new(adapter, MigrationConfig::new().directory(dir.path()))
        .with_registry(registry());
    (dir, engine)
}

async fn applied(engine: &MigrationEngine<SqliteAdapter>) -> Vec<String> {
    VersionStore::new(engine.adapter(), &engine.config().table_name)
        .applied_versions()
        .await
        .unwrap()
        .into_iter()
        .collect()
}

async fn table_names(engine: &MigrationEngine<SqliteAdapter>) -> Vec<String> {
    engine
        .adapter()
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )
        .await
        .unwrap()
        .iter()
        .filter_map(|row| row.get_str("name").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_migrate_and_rollback_create_users() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("20240101000000_create_users.rs"), "").unwrap();

    let mut registry = MigrationRegistry::new();
    registry.register_unit::<CreateUsers>("20240101000000").unwrap();

    let adapter = SqliteAdapter::open_in_memory().await.unwrap();
    let engine = MigrationEngine::new(adapter, MigrationConfig::new().directory(dir.path()))
        .with_registry(registry);

    assert_eq!(engine.migrate().await.unwrap(), vec!["20240101000000"]);
    assert_eq!(applied(&engine).await, vec!["20240101000000"]);
    assert!(table_names(&engine).await.contains(&"users".to_string()));

    assert_eq!(engine.rollback(1).await.unwrap(), vec!["20240101000000"]);
    assert!(applied(&engine).await.is_empty());
    assert!(!table_names(&engine).await.contains(&"users".to_string()));
}

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let (_dir, engine) = setup().await;

    let first = engine.migrate().await.unwrap();
    assert_eq!(
        first,
        vec!["20240101000000", "20240102000000", "20240103000000"]
    );
    assert!(engine.migrate().await.unwrap().is_empty());

    assert_eq!(
        table_names(&engine).await,
        vec!["hakumi_migrations", "posts", "users"]
    );
    assert_eq!(
        engine.current_version().await.unwrap().as_deref(),
        Some("20240103000000")
    );
    assert!(engine.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rollback_runs_newest_first() {
    let (_dir, engine) = setup().await;
    engine.migrate().await.unwrap();

    let reverted = engine.rollback(2).await.unwrap();
    assert_eq!(reverted, vec!["20240103000000", "20240102000000"]);
    assert_eq!(applied(&engine).await, vec!["20240101000000"]);
    assert_eq!(table_names(&engine).await, vec!["hakumi_migrations", "users"]);

    let columns = engine
        .adapter()
        .query("SELECT name FROM pragma_table_info('users')", &[])
        .await
        .unwrap();
    assert!(columns.iter().all(|row| row.get_str("name") != Some("email")));
}

#[tokio::test]
async fn test_rollback_all_then_migrate_again() {
    let (_dir, engine) = setup().await;
    engine.migrate().await.unwrap();

    assert_eq!(engine.rollback(10).await.unwrap().len(), 3);
    assert!(applied(&engine).await.is_empty());
    assert_eq!(table_names(&engine).await, vec!["hakumi_migrations"]);

    assert_eq!(engine.migrate().await.unwrap().len(), 3);
    assert_eq!(applied(&engine).await.len(), 3);
}

#[tokio::test]
async fn test_status_reports_each_file() {
    let (_dir, engine) = setup().await;
    engine.migrate().await.unwrap();
    engine.rollback(1).await.unwrap();

    let status = engine.status().await.unwrap();
    let summary: Vec<_> = status
        .iter()
        .map(|s| (s.name.as_str(), s.state))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("create_users", MigrationState::Up),
            ("create_posts", MigrationState::Up),
            ("add_email_to_users", MigrationState::Down),
        ]
    );
    assert!(status[0].migrated_at.is_some());
}

#[tokio::test]
async fn test_failed_migration_rolls_back() {
    let (dir, engine) = setup().await;
    engine.migrate().await.unwrap();
    std::fs::write(dir.path().join("20240109000000_broken_migration.rs"), "").unwrap();

    let err = engine.migrate().await.unwrap_err();
    assert!(matches!(err, MigrationError::Database(_)));

    assert!(!table_names(&engine).await.contains(&"audits".to_string()));
    assert!(!applied(&engine).await.contains(&"20240109000000".to_string()));
    assert_eq!(engine.pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unregistered_rust_migration_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("20240201000000_add_tags.rs"), "").unwrap();

    let adapter = SqliteAdapter::open_in_memory().await.unwrap();
    let engine = MigrationEngine::new(adapter, MigrationConfig::new().directory(dir.path()));

    let err = engine.migrate().await.unwrap_err();
    match err {
        MigrationError::MigrationLoadFailure { file, reason } => {
            assert_eq!(file, "20240201000000_add_tags.rs");
            assert!(reason.contains("AddTags"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
