//! Content-addressed schema fingerprints.
//!
//! The live schema is serialised into a canonical text in which every list is
//! sorted, so the same schema always yields the same text no matter what
//! order the catalog returns it in. The SHA-256 of that text is the digest.
//! Both are stored so a later mismatch can be explained with a line diff.
//!
//! ```text
//! hakumi-schema-fingerprint v1
//! table users|id
//!   column id|bigint|not null|
//!   column name|character varying(255)|null|
//! ```

use std::cmp::max;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::adapter::{Adapter, SqlValue};
use crate::config::{DriftPolicy, MigrationConfig};
use crate::error::{MigrateResult, MigrationError};
use crate::file::{self, MigrationFile};
use crate::history::VersionStore;
use crate::introspect::{Introspector, TableSchema};

/// First line of every canonical text. Bump when the format changes.
pub const CANONICAL_HEADER: &str = "hakumi-schema-fingerprint v1";

/// Key of the fingerprint row.
pub const FINGERPRINT_NAME: &str = "schema";

/// Length of the digest prefix shown in drift errors.
pub const SHORT_DIGEST_LEN: usize = 12;

/// Canonical schema text and its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFingerprint {
    canonical: String,
    digest: String,
}

impl SchemaFingerprint {
    /// Fingerprint a set of tables.
    pub fn build(tables: &[TableSchema]) -> Self {
        Self::from_canonical(build_canonical(tables))
    }

    /// Fingerprint an already-canonical text.
    pub fn from_canonical(canonical: String) -> Self {
        let digest = digest(&canonical);
        Self { canonical, digest }
    }

    /// Canonical text.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// SHA-256 hex digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Digest prefix used in messages.
    pub fn short_digest(&self) -> &str {
        short(&self.digest)
    }
}

/// A fingerprint row read back from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFingerprint {
    /// Stored digest.
    pub digest: String,
    /// Stored canonical text.
    pub canonical: String,
    /// RFC 3339 time of the last update.
    pub updated_at: String,
}

pub(crate) fn short(digest: &str) -> &str {
    digest.get(..SHORT_DIGEST_LEN).unwrap_or(digest)
}

/// Serialise tables into canonical text.
pub fn build_canonical(tables: &[TableSchema]) -> String {
    let mut sorted: Vec<&TableSchema> = tables.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut lines = vec![CANONICAL_HEADER.to_string()];

    for table in sorted {
        lines.push(format!("table {}|{}", table.name, table.primary_key.join(",")));

        let mut columns: Vec<_> = table.columns.iter().collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        for column in columns {
            lines.push(format!(
                "  column {}|{}|{}|{}",
                column.name,
                column.data_type,
                if column.nullable { "null" } else { "not null" },
                column.default.as_deref().unwrap_or_default()
            ));
        }

        let mut foreign_keys: Vec<_> = table.foreign_keys.iter().collect();
        foreign_keys.sort();
        for fk in foreign_keys {
            lines.push(format!(
                "  foreign_key {}|{}|{}",
                fk.column, fk.to_table, fk.to_column
            ));
        }

        let mut unique: Vec<_> = table.unique_columns.iter().collect();
        unique.sort();
        for columns in unique {
            lines.push(format!("  unique {}", columns));
        }
    }

    let mut canonical = lines.join("\n");
    canonical.push('\n');
    canonical
}

/// SHA-256 hex digest of canonical text.
pub fn digest(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare digests under a drift policy.
pub fn check(expected: &str, actual: &str, policy: DriftPolicy) -> MigrateResult<()> {
    if expected == actual {
        return Ok(());
    }

    if policy.allows_drift() {
        warn!(
            expected = short(expected),
            actual = short(actual),
            "Schema drift detected; continuing because drift is allowed"
        );
        return Ok(());
    }

    Err(MigrationError::SchemaDriftDetected {
        expected: short(expected).to_string(),
        actual: short(actual).to_string(),
    })
}

/// Line diff between two canonical texts.
///
/// Unchanged lines are omitted; removed lines start with `- ` and added lines
/// with `+ `, in document order.
pub fn diff_canonical(old: &str, new: &str) -> Vec<String> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    // Only the differing middle goes through the LCS table.
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];
    let (n, m) = (a.len(), b.len());

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                max(lcs[i + 1][j], lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(format!("- {}", a[i]));
            i += 1;
        } else {
            out.push(format!("+ {}", b[j]));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|line| format!("- {}", line)));
    out.extend(b[j..].iter().map(|line| format!("+ {}", line)));
    out
}

/// Fingerprint the live schema, skipping the engine's own tables.
pub async fn live_fingerprint(
    adapter: &dyn Adapter,
    config: &MigrationConfig,
) -> MigrateResult<SchemaFingerprint> {
    let tables = Introspector::new(adapter)
        .tables(&config.bookkeeping_tables())
        .await?;
    let fingerprint = SchemaFingerprint::build(&tables);
    debug!(tables = tables.len(), digest = fingerprint.short_digest(), "Computed live fingerprint");
    Ok(fingerprint)
}

/// Discovered migration files that have not been applied.
pub async fn pending_migrations(
    adapter: &dyn Adapter,
    config: &MigrationConfig,
) -> MigrateResult<Vec<MigrationFile>> {
    let files = file::discover(&config.directory).await?;
    let applied = if Introspector::new(adapter)
        .table_exists(&config.table_name)
        .await?
    {
        VersionStore::new(adapter, &config.table_name)
            .applied_versions()
            .await?
    } else {
        Default::default()
    };

    Ok(files
        .into_iter()
        .filter(|f| !applied.contains(&f.version))
        .collect())
}

/// Reads and writes the fingerprint table.
pub struct FingerprintStore<'a> {
    adapter: &'a dyn Adapter,
    table: &'a str,
}

impl<'a> FingerprintStore<'a> {
    /// Create a store over `table`.
    pub fn new(adapter: &'a dyn Adapter, table: &'a str) -> Self {
        Self { adapter, table }
    }

    fn quoted_table(&self) -> String {
        self.adapter.dialect().quote_identifier(self.table)
    }

    /// Create the fingerprint table if it does not exist.
    pub async fn ensure_table(&self) -> MigrateResult<()> {
        self.adapter.dialect().check_identifier(self.table)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (name VARCHAR(64) PRIMARY KEY, digest VARCHAR(64) NOT NULL, canonical TEXT NOT NULL, updated_at VARCHAR(32) NOT NULL)",
            self.quoted_table()
        );
        self.adapter.exec(&sql).await
    }

    /// Replace the stored fingerprint.
    pub async fn store(&self, fingerprint: &SchemaFingerprint) -> MigrateResult<()> {
        self.ensure_table().await?;

        let dialect = self.adapter.dialect();
        let delete = format!(
            "DELETE FROM {} WHERE name = {}",
            self.quoted_table(),
            dialect.bind_marker(1)
        );
        let insert = format!(
            "INSERT INTO {} (name, digest, canonical, updated_at) VALUES ({}, {}, {}, {})",
            self.quoted_table(),
            dialect.bind_marker(1),
            dialect.bind_marker(2),
            dialect.bind_marker(3),
            dialect.bind_marker(4)
        );
        let params = [
            SqlValue::from(FINGERPRINT_NAME),
            SqlValue::from(fingerprint.digest()),
            SqlValue::from(fingerprint.canonical()),
            SqlValue::from(Utc::now().to_rfc3339()),
        ];

        self.adapter.begin().await?;
        let result = async {
            self.adapter
                .exec_params(&delete, &[SqlValue::from(FINGERPRINT_NAME)])
                .await?;
            self.adapter.exec_params(&insert, &params).await
        }
        .await;

        match result {
            Ok(_) => {
                self.adapter.commit().await?;
                debug!(digest = fingerprint.short_digest(), "Stored schema fingerprint");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.adapter.rollback().await {
                    warn!(error = %rollback_err, "Rollback of fingerprint update failed");
                }
                Err(e)
            }
        }
    }

    /// The stored fingerprint, if one was ever written.
    pub async fn read_from_db(&self) -> MigrateResult<Option<StoredFingerprint>> {
        if !Introspector::new(self.adapter).table_exists(self.table).await? {
            return Ok(None);
        }

        let sql = format!(
            "SELECT digest, canonical, updated_at FROM {} WHERE name = {}",
            self.quoted_table(),
            self.adapter.dialect().bind_marker(1)
        );
        let rows = self
            .adapter
            .query(&sql, &[SqlValue::from(FINGERPRINT_NAME)])
            .await?;

        Ok(rows.first().map(|row| StoredFingerprint {
            digest: row.get_str("digest").unwrap_or_default().to_string(),
            canonical: row.get_str("canonical").unwrap_or_default().to_string(),
            updated_at: row.get_str("updated_at").unwrap_or_default().to_string(),
        }))
    }

    /// Only the stored canonical text.
    pub async fn read_canonical_from_db(&self) -> MigrateResult<Option<String>> {
        Ok(self.read_from_db().await?.map(|stored| stored.canonical))
    }
}
