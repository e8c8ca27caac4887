//! Schema fingerprint and drift detection against SQLite.

use hakumi::migrate::{
    Adapter, DriftIssue, FingerprintStore, MigrationConfig, MigrationEngine, MigrationError,
    Reporter, fingerprint,
};
use hakumi::sqlite::SqliteAdapter;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

async fn setup() -> (TempDir, MigrationEngine<SqliteAdapter>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("20240101000000_create_users.sql"),
        "-- migrate:up\n\
         CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name varchar(255));\n\
         -- migrate:down\n\
         DROP TABLE users;\n",
    )
    .unwrap();

    let adapter = SqliteAdapter::open_in_memory().await.unwrap();
    let engine = MigrationEngine::new(adapter, MigrationConfig::new().directory(dir.path()));
    (dir, engine)
}

#[tokio::test]
async fn test_added_column_is_reported_as_drift() {
    let (_dir, engine) = setup().await;
    engine.migrate().await.unwrap();
    let stored = engine.update_fingerprint().await.unwrap();

    assert!(engine.drift_checker().check_issues().await.unwrap().is_empty());

    engine
        .adapter()
        .exec("ALTER TABLE users ADD COLUMN age integer")
        .await
        .unwrap();

    let issues = engine.drift_checker().check_issues().await.unwrap();
    match &issues[..] {
        [
            DriftIssue::SchemaMismatch {
                expected_digest,
                actual_digest,
                diff_lines,
            },
        ] => {
            assert_eq!(expected_digest, stored.digest());
            assert_ne!(expected_digest, actual_digest);
            assert!(diff_lines.iter().any(|line| line.contains("age")));
            assert!(diff_lines.iter().all(|line| line.starts_with('+')));
        }
        other => panic!("unexpected issues: {:?}", other),
    }

    let report = Reporter::render_all(&issues);
    assert!(report[0].starts_with("Schema drift detected"));

    let err = engine.drift_checker().verify().await.unwrap_err();
    assert!(matches!(err, MigrationError::SchemaDriftDetected { .. }));
}

#[tokio::test]
async fn test_fingerprint_ignores_bookkeeping_tables() {
    let (_dir, engine) = setup().await;
    engine.migrate().await.unwrap();
    let stored = engine.update_fingerprint().await.unwrap();

    assert!(!stored.canonical().contains("hakumi_migrations"));
    assert!(!stored.canonical().contains("hakumi_schema_fingerprints"));
    assert!(!stored.canonical().contains("sqlite_sequence"));
    assert!(stored.canonical().contains("table users|id"));

    let store = FingerprintStore::new(engine.adapter(), &engine.config().fingerprint_table);
    let read_back = store.read_from_db().await.unwrap().unwrap();
    assert_eq!(read_back.digest, stored.digest());
    assert_eq!(
        store.read_canonical_from_db().await.unwrap().as_deref(),
        Some(stored.canonical())
    );
    assert_eq!(fingerprint::digest(&read_back.canonical), read_back.digest);
}

#[tokio::test]
async fn test_pending_and_missing_fingerprint() {
    let (_dir, engine) = setup().await;

    let issues = engine.drift_checker().check_issues().await.unwrap();
    assert_eq!(
        issues,
        vec![
            DriftIssue::PendingMigrations {
                versions: vec!["20240101000000".into()]
            },
            DriftIssue::NoStoredFingerprint,
        ]
    );

    let err = engine.drift_checker().verify().await.unwrap_err();
    assert!(matches!(err, MigrationError::PendingMigrations(ref v) if v.len() == 1));

    engine.migrate().await.unwrap();
    assert_eq!(
        engine.drift_checker().check_issues().await.unwrap(),
        vec![DriftIssue::NoStoredFingerprint]
    );
    assert!(engine.drift_checker().verify().await.is_ok());
}

#[tokio::test]
async fn test_allowed_drift_passes_verify() {
    let (dir, engine) = setup().await;
    engine.migrate().await.unwrap();
    engine.update_fingerprint().await.unwrap();
    engine
        .adapter()
        .exec("CREATE TABLE scratch (v integer)")
        .await
        .unwrap();

    let lenient = MigrationConfig::new()
        .directory(dir.path())
        .allow_schema_drift(true);
    let checker = hakumi::migrate::DriftChecker::new(engine.adapter(), &lenient);
    assert!(checker.verify().await.is_ok());
    assert_eq!(checker.check_issues().await.unwrap().len(), 1);

    engine.update_fingerprint().await.unwrap();
    assert!(engine.drift_checker().verify().await.is_ok());
}
