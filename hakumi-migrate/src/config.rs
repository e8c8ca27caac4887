//! Migration configuration.
//!
//! Configuration is an explicit value handed to the engine. It can be built in
//! code, or read from the `[migrations]` table of a `hakumi.toml`:
//!
//! ```toml
//! [migrations]
//! directory = "./db/migrate"
//! table_name = "hakumi_migrations"
//! allow_schema_drift = false
//! ```
//!
//! String values may reference environment variables as `${VAR_NAME}`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Environment variable that downgrades schema drift to a warning.
pub const ALLOW_DRIFT_ENV: &str = "HAKUMI_ALLOW_SCHEMA_DRIFT";

/// What to do when the live schema does not match the stored fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriftPolicy {
    /// Fail with `SchemaDriftDetected`.
    #[default]
    Strict,
    /// Log a warning and continue.
    Allow,
}

impl DriftPolicy {
    /// `Allow` if `HAKUMI_ALLOW_SCHEMA_DRIFT` is set to anything, else `Strict`.
    pub fn from_env() -> Self {
        if std::env::var_os(ALLOW_DRIFT_ENV).is_some() {
            Self::Allow
        } else {
            Self::Strict
        }
    }

    /// Whether drift is tolerated.
    pub fn allows_drift(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Configuration for the migration engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Directory holding migration files.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Version table name.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Fingerprint table name.
    #[serde(default = "default_fingerprint_table")]
    pub fingerprint_table: String,

    /// Tolerate schema drift.
    #[serde(default)]
    pub allow_schema_drift: bool,

    /// Warn when a migration runs outside a transaction.
    #[serde(default = "default_true")]
    pub warn_on_non_transactional: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            table_name: default_table_name(),
            fingerprint_table: default_fingerprint_table(),
            allow_schema_drift: false,
            warn_on_non_transactional: true,
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from("./db/migrate")
}

fn default_table_name() -> String {
    "hakumi_migrations".to_string()
}

fn default_fingerprint_table() -> String {
    "hakumi_schema_fingerprints".to_string()
}

fn default_true() -> bool {
    true
}

/// Top-level `hakumi.toml`; only the `[migrations]` table is read here.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    migrations: MigrationConfig,
}

impl MigrationConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `HAKUMI_ALLOW_SCHEMA_DRIFT` applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse the `[migrations]` table of a `hakumi.toml` document, then apply
    /// environment overrides.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        let expanded = expand_env_vars(content)?;
        let file: ConfigFile =
            toml::from_str(&expanded).map_err(|e| MigrationError::config(e.to_string()))?;
        Ok(file.migrations.with_env_overrides())
    }

    /// Load from a `hakumi.toml` file.
    pub fn from_file(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if DriftPolicy::from_env().allows_drift() {
            self.allow_schema_drift = true;
        }
        self
    }

    /// Set the migrations directory.
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = dir.into();
        self
    }

    /// Set the version table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the fingerprint table name.
    pub fn fingerprint_table(mut self, name: impl Into<String>) -> Self {
        self.fingerprint_table = name.into();
        self
    }

    /// Tolerate schema drift.
    pub fn allow_schema_drift(mut self, allow: bool) -> Self {
        self.allow_schema_drift = allow;
        self
    }

    /// Toggle the non-transactional warning.
    pub fn warn_on_non_transactional(mut self, warn: bool) -> Self {
        self.warn_on_non_transactional = warn;
        self
    }

    /// Drift policy implied by this configuration.
    ///
    /// `HAKUMI_ALLOW_SCHEMA_DRIFT` is read here as well, so it applies however
    /// the configuration was built.
    pub fn drift_policy(&self) -> DriftPolicy {
        if self.allow_schema_drift {
            DriftPolicy::Allow
        } else {
            DriftPolicy::from_env()
        }
    }

    /// Tables the engine owns, excluded from introspection.
    pub fn bookkeeping_tables(&self) -> [&str; 2] {
        [&self.table_name, &self.fingerprint_table]
    }
}

/// Expand `${VAR_NAME}` references. Unset variables are left as written.
fn expand_env_vars(content: &str) -> MigrateResult<String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| MigrationError::config(e.to_string()))?;

    let expanded = re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MigrationConfig::default();
        assert_eq!(config.directory, PathBuf::from("./db/migrate"));
        assert_eq!(config.table_name, "hakumi_migrations");
        assert_eq!(config.fingerprint_table, "hakumi_schema_fingerprints");
        assert!(!config.allow_schema_drift);
        assert!(config.warn_on_non_transactional);
        assert_eq!(config.drift_policy(), DriftPolicy::Strict);
    }

    #[test]
    fn test_builder() {
        let config = MigrationConfig::new()
            .directory("migrations")
            .table_name("schema_versions")
            .allow_schema_drift(true)
            .warn_on_non_transactional(false);

        assert_eq!(config.directory, PathBuf::from("migrations"));
        assert_eq!(config.bookkeeping_tables(), ["schema_versions", "hakumi_schema_fingerprints"]);
        assert_eq!(config.drift_policy(), DriftPolicy::Allow);
        assert!(!config.warn_on_non_transactional);
    }

    #[test]
    fn test_parse_migrations_table() {
        let toml = r#"
            [database]
            url = "postgres://localhost/app"

            [migrations]
            directory = "./migrations"
            table_name = "versions"
        "#;

        let config = MigrationConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.directory, PathBuf::from("./migrations"));
        assert_eq!(config.table_name, "versions");
        assert_eq!(config.fingerprint_table, "hakumi_schema_fingerprints");
    }

    #[test]
    fn test_missing_migrations_table_uses_defaults() {
        let config = MigrationConfig::from_toml_str("").unwrap();
        assert_eq!(config, MigrationConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = MigrationConfig::from_toml_str("[migrations]\ndirectry = \"x\"").unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("HAKUMI_TEST_MIGRATIONS_DIR", "/srv/app/migrate");
        }
        let config =
            MigrationConfig::from_toml_str("[migrations]\ndirectory = \"${HAKUMI_TEST_MIGRATIONS_DIR}\"")
                .unwrap();
        assert_eq!(config.directory, PathBuf::from("/srv/app/migrate"));
        unsafe {
            std::env::remove_var("HAKUMI_TEST_MIGRATIONS_DIR");
        }

        let untouched = expand_env_vars("x = \"${HAKUMI_TEST_UNSET_VAR}\"").unwrap();
        assert_eq!(untouched, "x = \"${HAKUMI_TEST_UNSET_VAR}\"");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hakumi.toml");
        std::fs::write(&path, "[migrations]\nwarn_on_non_transactional = false\n").unwrap();

        let config = MigrationConfig::from_file(&path).unwrap();
        assert!(!config.warn_on_non_transactional);

        assert!(MigrationConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
