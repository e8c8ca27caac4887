//! Drift detection.
//!
//! [`DriftChecker`] compares the database against what the code expects: are
//! there migration files that were never applied, and does the live schema
//! still hash to the fingerprint stored after the last migration? Findings
//! are returned as [`DriftIssue`] values; turning them into text is the job
//! of [`Reporter`]. Checking takes no lock and writes nothing.

use crate::adapter::Adapter;
use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::fingerprint::{self, FingerprintStore};

/// A single drift finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftIssue {
    /// Migration files exist that were never applied.
    PendingMigrations {
        /// Unapplied versions, ascending.
        versions: Vec<String>,
    },
    /// No fingerprint has been stored yet.
    NoStoredFingerprint,
    /// The live schema does not match the stored fingerprint.
    SchemaMismatch {
        /// Stored digest.
        expected_digest: String,
        /// Live digest.
        actual_digest: String,
        /// Diff from stored to live canonical text.
        diff_lines: Vec<String>,
    },
}

/// Runs the drift checks.
pub struct DriftChecker<'a> {
    adapter: &'a dyn Adapter,
    config: &'a MigrationConfig,
}

impl<'a> DriftChecker<'a> {
    /// Create a checker.
    pub fn new(adapter: &'a dyn Adapter, config: &'a MigrationConfig) -> Self {
        Self { adapter, config }
    }

    /// All findings. Pending migrations are reported independently of the
    /// fingerprint state.
    pub async fn check_issues(&self) -> MigrateResult<Vec<DriftIssue>> {
        let mut issues = Vec::new();
        if let Some(issue) = self.pending_migrations_issue().await? {
            issues.push(issue);
        }
        if let Some(issue) = self.schema_drift_issue().await? {
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Unapplied migration files, if any.
    pub async fn pending_migrations_issue(&self) -> MigrateResult<Option<DriftIssue>> {
        let pending = fingerprint::pending_migrations(self.adapter, self.config).await?;
        if pending.is_empty() {
            return Ok(None);
        }
        Ok(Some(DriftIssue::PendingMigrations {
            versions: pending.into_iter().map(|f| f.version).collect(),
        }))
    }

    /// Missing or mismatched fingerprint, if any.
    pub async fn schema_drift_issue(&self) -> MigrateResult<Option<DriftIssue>> {
        let store = FingerprintStore::new(self.adapter, &self.config.fingerprint_table);
        let Some(stored) = store.read_from_db().await? else {
            return Ok(Some(DriftIssue::NoStoredFingerprint));
        };

        let live = fingerprint::live_fingerprint(self.adapter, self.config).await?;
        if live.digest() == stored.digest {
            return Ok(None);
        }

        Ok(Some(DriftIssue::SchemaMismatch {
            diff_lines: fingerprint::diff_canonical(&stored.canonical, live.canonical()),
            expected_digest: stored.digest,
            actual_digest: live.digest().to_string(),
        }))
    }

    /// Fail on pending migrations or on drift the configuration does not allow.
    ///
    /// A missing fingerprint is not an error here.
    pub async fn verify(&self) -> MigrateResult<()> {
        if let Some(DriftIssue::PendingMigrations { versions }) =
            self.pending_migrations_issue().await?
        {
            return Err(MigrationError::PendingMigrations(versions));
        }
        if let Some(DriftIssue::SchemaMismatch {
            expected_digest,
            actual_digest,
            ..
        }) = self.schema_drift_issue().await?
        {
            fingerprint::check(&expected_digest, &actual_digest, self.config.drift_policy())?;
        }
        Ok(())
    }
}

/// Renders drift findings as text lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter;

impl Reporter {
    /// Lines for one issue.
    pub fn render(issue: &DriftIssue) -> Vec<String> {
        match issue {
            DriftIssue::PendingMigrations { versions } => {
                let mut lines = vec![format!("{} pending migration(s):", versions.len())];
                lines.extend(versions.iter().map(|v| format!("  {}", v)));
                lines
            }
            DriftIssue::NoStoredFingerprint => vec![
                "No schema fingerprint stored; update the fingerprint after migrating.".to_string(),
            ],
            DriftIssue::SchemaMismatch {
                expected_digest,
                actual_digest,
                diff_lines,
            } => {
                let mut lines = vec![format!(
                    "Schema drift detected: expected {}, found {}",
                    fingerprint::short(expected_digest),
                    fingerprint::short(actual_digest)
                )];
                lines.extend(diff_lines.iter().map(|l| format!("    {}", l)));
                lines
            }
        }
    }

    /// Lines for every issue, in order.
    pub fn render_all(issues: &[DriftIssue]) -> Vec<String> {
        issues.iter().flat_map(Self::render).collect()
    }
}
