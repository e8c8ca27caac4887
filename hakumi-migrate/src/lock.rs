//! Cross-process mutual exclusion for migration runs.
//!
//! PostgreSQL and MySQL provide session-scoped named locks. Every migrate,
//! rollback and fingerprint update runs inside [`with_lock`], so two deploys
//! racing against the same database apply each migration exactly once.
//! SQLite has no such lock; its file lock already serialises writers.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};

/// Run `body` while holding the migration lock.
///
/// Acquisition blocks until the lock is granted. The lock is released after
/// `body` finishes, whether it returned `Ok`, returned `Err` or panicked; a
/// panic is resumed once the lock is released.
pub async fn with_lock<T, F>(adapter: &dyn Adapter, body: F) -> MigrateResult<T>
where
    F: Future<Output = MigrateResult<T>>,
{
    let dialect = adapter.dialect();
    if !dialect.supports_advisory_lock() {
        return body.await;
    }

    acquire(adapter, dialect).await?;

    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let released = release(adapter, dialect).await;

    match outcome {
        Err(panic) => {
            if let Err(e) = released {
                warn!(error = %e, "Failed to release migration lock after panic");
            }
            std::panic::resume_unwind(panic)
        }
        Ok(Err(e)) => {
            if let Err(release_err) = released {
                warn!(error = %release_err, "Failed to release migration lock");
            }
            Err(e)
        }
        Ok(Ok(value)) => {
            released?;
            Ok(value)
        }
    }
}

async fn acquire(adapter: &dyn Adapter, dialect: Dialect) -> MigrateResult<()> {
    let sql = dialect.advisory_lock_statement()?;
    debug!(%dialect, "Acquiring migration lock");
    let rows = adapter.query(&sql, &[]).await?;

    // GET_LOCK answers 1 when granted, 0 on timeout and NULL on error.
    if dialect == Dialect::MySql {
        let granted = rows
            .first()
            .and_then(|row| row.get_index(0))
            .map(|v| v.as_i64() == Some(1));
        if granted == Some(false) {
            return Err(MigrationError::database("failed to acquire migration lock"));
        }
    }

    debug!(%dialect, "Migration lock acquired");
    Ok(())
}

async fn release(adapter: &dyn Adapter, dialect: Dialect) -> MigrateResult<()> {
    let sql = dialect.advisory_unlock_statement()?;
    adapter.query(&sql, &[]).await?;
    debug!(%dialect, "Migration lock released");
    Ok(())
}
