//! Executable migration units.
//!
//! A [`MigrationFile`] names a migration; a [`Migration`] is the code that
//! runs it. Rust units are looked up by version in a [`MigrationRegistry`].
//! SQL files are parsed into a [`SqlFileMigration`]. Units receive a
//! [`SchemaContext`] so their bodies can mix the table DSL with raw SQL.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::adapter::Adapter;
use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};
use crate::file::{MigrationFile, MigrationKind};
use crate::schema::{ColumnDefinition, ColumnType, ForeignKeyDefinition, IndexDefinition, TableDefinition};
use crate::sql::SqlGenerator;

/// One reversible schema change.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Apply the change.
    async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()>;

    /// Revert the change.
    async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()>;

    /// Run outside a transaction even where DDL is transactional.
    ///
    /// Needed for statements such as `CREATE INDEX CONCURRENTLY`.
    fn disable_ddl_transaction(&self) -> bool {
        false
    }
}

type Factory = Arc<dyn Fn() -> Box<dyn Migration> + Send + Sync>;

/// Maps versions to Rust migration units.
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    factories: BTreeMap<String, Factory>,
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("versions", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory producing a fresh unit for `version`.
    pub fn register<F>(&mut self, version: impl Into<String>, factory: F) -> MigrateResult<&mut Self>
    where
        F: Fn() -> Box<dyn Migration> + Send + Sync + 'static,
    {
        let version = version.into();
        if self.factories.contains_key(&version) {
            return Err(MigrationError::DuplicateMigration {
                existing: format!("registered unit for {}", version),
                name: version,
            });
        }
        self.factories.insert(version, Arc::new(factory));
        Ok(self)
    }

    /// Register a `Default`-constructible unit type for `version`.
    pub fn register_unit<M>(&mut self, version: impl Into<String>) -> MigrateResult<&mut Self>
    where
        M: Migration + Default + 'static,
    {
        self.register(version, || Box::new(M::default()))
    }

    /// Whether a unit is registered for `version`.
    pub fn contains(&self, version: &str) -> bool {
        self.factories.contains_key(version)
    }

    /// Instantiate the unit for `version`.
    pub fn instantiate(&self, version: &str) -> Option<Box<dyn Migration>> {
        self.factories.get(version).map(|factory| factory())
    }

    /// Registered versions, ascending.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// A migration read from a `.sql` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFileMigration {
    filename: String,
    up: String,
    down: Option<String>,
    no_transaction: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

impl SqlFileMigration {
    /// Parse `-- migrate:up`, `-- migrate:down` and `-- migrate:no-transaction` sections.
    pub fn parse(filename: impl Into<String>, content: &str) -> MigrateResult<Self> {
        let filename = filename.into();
        let mut up: Option<String> = None;
        let mut down: Option<String> = None;
        let mut no_transaction = false;
        let mut section = Section::Preamble;

        for line in content.lines() {
            let marker = line.trim().to_ascii_lowercase();
            match marker.as_str() {
                "-- migrate:up" => {
                    section = Section::Up;
                    up.get_or_insert_with(String::new);
                    continue;
                }
                "-- migrate:down" => {
                    section = Section::Down;
                    down.get_or_insert_with(String::new);
                    continue;
                }
                "-- migrate:no-transaction" => {
                    no_transaction = true;
                    continue;
                }
                _ => {}
            }

            let target = match section {
                Section::Preamble => continue,
                Section::Up => up.as_mut(),
                Section::Down => down.as_mut(),
            };
            if let Some(buf) = target {
                buf.push_str(line);
                buf.push('\n');
            }
        }

        let up = up
            .map(|s| s.trim().to_string())
            .ok_or_else(|| MigrationError::load_failure(&filename, "missing '-- migrate:up' section"))?;
        let down = down.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(Self {
            filename,
            up,
            down,
            no_transaction,
        })
    }

    /// SQL run on migrate.
    pub fn up_sql(&self) -> &str {
        &self.up
    }

    /// SQL run on rollback, if the file has any.
    pub fn down_sql(&self) -> Option<&str> {
        self.down.as_deref()
    }
}

#[async_trait]
impl Migration for SqlFileMigration {
    async fn up(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        if self.up.is_empty() {
            return Ok(());
        }
        schema.execute(&self.up).await
    }

    async fn down(&self, schema: &SchemaContext<'_>) -> MigrateResult<()> {
        match &self.down {
            Some(sql) => schema.execute(sql).await,
            None => Err(MigrationError::load_failure(
                &self.filename,
                "no '-- migrate:down' section; migration is irreversible",
            )),
        }
    }

    fn disable_ddl_transaction(&self) -> bool {
        self.no_transaction
    }
}

/// Resolves migration files to executable units.
#[derive(Debug, Clone, Default)]
pub struct MigrationLoader {
    registry: MigrationRegistry,
}

impl MigrationLoader {
    /// Create a loader over `registry`.
    pub fn new(registry: MigrationRegistry) -> Self {
        Self { registry }
    }

    /// The registry consulted first.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Resolve `file`: a registered unit wins, then a `.sql` body.
    pub async fn load(&self, file: &MigrationFile) -> MigrateResult<Box<dyn Migration>> {
        if let Some(unit) = self.registry.instantiate(&file.version) {
            debug!(file = %file.filename, "Loaded registered migration");
            return Ok(unit);
        }

        match file.kind {
            MigrationKind::Sql => {
                let content = tokio::fs::read_to_string(&file.path)
                    .await
                    .map_err(|e| MigrationError::load_failure(&file.filename, e.to_string()))?;
                let unit = SqlFileMigration::parse(&file.filename, &content)?;
                debug!(file = %file.filename, "Loaded SQL migration");
                Ok(Box::new(unit))
            }
            MigrationKind::Rust => Err(MigrationError::load_failure(
                &file.filename,
                format!(
                    "no migration registered for version {} (expected type {})",
                    file.version,
                    file.type_name()
                ),
            )),
        }
    }
}

/// What a migration body sees: the live adapter plus the DDL compiler.
pub struct SchemaContext<'a> {
    adapter: &'a dyn Adapter,
    generator: SqlGenerator,
}

impl<'a> SchemaContext<'a> {
    /// Wrap an adapter.
    pub fn new(adapter: &'a dyn Adapter) -> Self {
        Self {
            adapter,
            generator: SqlGenerator::new(adapter.dialect()),
        }
    }

    /// Dialect of the connection.
    pub fn dialect(&self) -> Dialect {
        self.generator.dialect()
    }

    /// The raw adapter.
    pub fn adapter(&self) -> &'a dyn Adapter {
        self.adapter
    }

    /// The DDL compiler for this connection.
    pub fn generator(&self) -> &SqlGenerator {
        &self.generator
    }

    /// Execute raw SQL.
    pub async fn execute(&self, sql: &str) -> MigrateResult<()> {
        self.adapter.exec(sql).await
    }

    async fn execute_all(&self, statements: &[String]) -> MigrateResult<()> {
        for sql in statements {
            self.adapter.exec(sql).await?;
        }
        Ok(())
    }

    /// Build and create a table, including its foreign keys.
    ///
    /// All statements are compiled before any of them is executed.
    pub async fn create_table<F>(&self, name: &str, build: F) -> MigrateResult<()>
    where
        F: FnOnce(&mut TableDefinition),
    {
        let mut table = TableDefinition::new(name);
        build(&mut table);
        let statements = self.generator.create_table_with_foreign_keys(&table)?;
        self.execute_all(&statements).await
    }

    /// Drop a table.
    pub async fn drop_table(&self, name: &str) -> MigrateResult<()> {
        self.execute(&self.generator.drop_table(name)).await
    }

    /// Rename a table.
    pub async fn rename_table(&self, from: &str, to: &str) -> MigrateResult<()> {
        self.execute(&self.generator.rename_table(from, to)).await
    }

    /// Add a column, configuring it with `build`.
    pub async fn add_column<F>(
        &self,
        table: &str,
        name: &str,
        column_type: ColumnType,
        build: F,
    ) -> MigrateResult<()>
    where
        F: FnOnce(&mut ColumnDefinition),
    {
        let mut column = ColumnDefinition::new(name, column_type);
        build(&mut column);
        let sql = self.generator.add_column(table, &column)?;
        self.execute(&sql).await
    }

    /// Drop a column.
    pub async fn remove_column(&self, table: &str, name: &str) -> MigrateResult<()> {
        self.execute(&self.generator.remove_column(table, name)).await
    }

    /// Rename a column.
    pub async fn rename_column(&self, table: &str, from: &str, to: &str) -> MigrateResult<()> {
        self.execute(&self.generator.rename_column(table, from, to)).await
    }

    /// Change a column's type.
    pub async fn change_column(
        &self,
        table: &str,
        name: &str,
        column_type: ColumnType,
    ) -> MigrateResult<()> {
        let column = ColumnDefinition::new(name, column_type);
        let sql = self.generator.change_column(table, &column)?;
        self.execute(&sql).await
    }

    /// Create an index.
    pub async fn add_index(&self, index: IndexDefinition) -> MigrateResult<()> {
        let sql = self.generator.add_index(&index)?;
        self.execute(&sql).await
    }

    /// Drop an index.
    pub async fn remove_index(&self, index: IndexDefinition) -> MigrateResult<()> {
        let sql = self.generator.remove_index(&index)?;
        self.execute(&sql).await
    }

    /// Add a foreign key from `table.column` to `to_table.id`.
    pub async fn add_foreign_key(
        &self,
        table: &str,
        foreign_key: &ForeignKeyDefinition,
    ) -> MigrateResult<()> {
        let sql = self.generator.add_foreign_key(table, foreign_key)?;
        self.execute(&sql).await
    }

    /// Drop a foreign key constraint.
    pub async fn remove_foreign_key(
        &self,
        table: &str,
        foreign_key: &ForeignKeyDefinition,
    ) -> MigrateResult<()> {
        let sql = self.generator.remove_foreign_key(table, foreign_key)?;
        self.execute(&sql).await
    }
}
