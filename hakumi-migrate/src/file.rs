//! Migration files on disk.
//!
//! A migration file is named `{YYYYMMDDHHMMSS}_{snake_case_name}.rs` or
//! `.sql`. The 14-digit prefix is the version: versions are unique and sort
//! lexicographically in chronological order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use regex_lite::Regex;
use tracing::info;

use crate::error::{MigrateResult, MigrationError};

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{14})_(\w+)\.(rs|sql)$").expect("valid migration filename pattern")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid migration name pattern"));

/// Source format of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationKind {
    /// A Rust unit registered with the migration registry.
    Rust,
    /// Plain SQL with `-- migrate:up` / `-- migrate:down` sections.
    Sql,
}

impl MigrationKind {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Rust => "rs",
            Self::Sql => "sql",
        }
    }
}

/// A migration file discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// 14-digit version.
    pub version: String,
    /// Logical snake_case name.
    pub name: String,
    /// File name including extension.
    pub filename: String,
    /// Full path.
    pub path: PathBuf,
    /// Source format.
    pub kind: MigrationKind,
}

impl MigrationFile {
    /// Parse a path whose file name follows the migration naming grammar.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let filename = path.file_name()?.to_str()?.to_string();
        let caps = FILENAME_RE.captures(&filename)?;

        let kind = match &caps[3] {
            "rs" => MigrationKind::Rust,
            _ => MigrationKind::Sql,
        };

        Some(Self {
            version: caps[1].to_string(),
            name: caps[2].to_string(),
            filename: filename.clone(),
            path,
            kind,
        })
    }

    /// Type name a Rust unit for this file is expected to carry.
    ///
    /// `create_users` becomes `CreateUsers`.
    pub fn type_name(&self) -> String {
        type_name_for(&self.name)
    }
}

impl fmt::Display for MigrationFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename)
    }
}

/// Split on `_` and capitalise each segment.
pub fn type_name_for(name: &str) -> String {
    name.split('_')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// List migration files in `dir`, sorted by version.
///
/// Files that do not follow the naming grammar are ignored. A missing
/// directory yields an empty list.
pub async fn discover(dir: impl AsRef<Path>) -> MigrateResult<Vec<MigrationFile>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    if !dir.exists() {
        return Ok(files);
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(file) = MigrationFile::from_path(entry.path()) {
            files.push(file);
        }
    }

    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    for pair in files.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(MigrationError::DuplicateMigration {
                name: pair[1].filename.clone(),
                existing: pair[0].filename.clone(),
            });
        }
    }

    Ok(files)
}

/// Writes new, timestamped migration files.
#[derive(Debug, Clone)]
pub struct MigrationGenerator {
    directory: PathBuf,
}

impl MigrationGenerator {
    /// Create a generator writing into `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// The target directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create a migration stamped with the current UTC time.
    pub async fn create(&self, name: &str, kind: MigrationKind) -> MigrateResult<MigrationFile> {
        let version = Utc::now().format("%Y%m%d%H%M%S").to_string();
        self.create_with_version(&version, name, kind).await
    }

    /// Create a migration with an explicit version.
    pub async fn create_with_version(
        &self,
        version: &str,
        name: &str,
        kind: MigrationKind,
    ) -> MigrateResult<MigrationFile> {
        validate_name(name)?;

        if version.len() != 14 || !version.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MigrationError::invalid_name(
                version,
                "version must be a 14-digit timestamp",
            ));
        }

        for existing in discover(&self.directory).await? {
            if existing.name == name {
                return Err(MigrationError::DuplicateMigration {
                    name: name.to_string(),
                    existing: existing.filename,
                });
            }
            if existing.version == version {
                return Err(MigrationError::DuplicateMigration {
                    name: version.to_string(),
                    existing: existing.filename,
                });
            }
        }

        tokio::fs::create_dir_all(&self.directory).await?;

        let filename = format!("{}_{}.{}", version, name, kind.extension());
        let path = self.directory.join(&filename);
        let body = match kind {
            MigrationKind::Rust => rust_template(version, name),
            MigrationKind::Sql => sql_template(),
        };
        tokio::fs::write(&path, body).await?;

        info!(file = %filename, "Created migration");

        Ok(MigrationFile {
            version: version.to_string(),
            name: name.to_string(),
            filename,
            path,
            kind,
        })
    }
}

/// Check a logical migration name.
pub fn validate_name(name: &str) -> MigrateResult<()> {
    if name.is_empty() {
        return Err(MigrationError::invalid_name(name, "name must not be empty"));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(MigrationError::invalid_name(name, "name must not start with a digit"));
    }
    if !NAME_RE.is_match(name) {
        return Err(MigrationError::invalid_name(
            name,
            "use lowercase letters, digits and underscores only",
        ));
    }
    Ok(())
}

fn rust_template(version: &str, name: &str) -> String {
    let type_name = type_name_for(name);
    format!(
        r#"use async_trait::async_trait;
use hakumi::migrate::{{MigrateResult, Migration, SchemaContext}};

/// Register with `registry.register_unit::<{type_name}>("{version}")`.
#[derive(Default)]
pub struct {type_name};

#[async_trait]
impl Migration for {type_name} {{
    async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {{
        let _ = schema;
        Ok(())
    }}

    async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {{
        let _ = schema;
        Ok(())
    }}
}}
"#
    )
}

fn sql_template() -> String {
    "-- migrate:up\n\n\n-- migrate:down\n\n".to_string()
}
