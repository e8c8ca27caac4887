//! Live schema introspection.
//!
//! Reads tables, columns, primary keys, foreign keys and unique indexes from
//! the database catalog. PostgreSQL and MySQL are read through
//! `information_schema` (plus `pg_index` for PostgreSQL unique indexes);
//! SQLite through `sqlite_master` and the table-valued `pragma_*` functions.
//! Table names are always passed as bind parameters.

use crate::adapter::{Adapter, Row, SqlValue};
use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};

/// A column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Database type, lowercased.
    pub data_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default expression.
    pub default: Option<String>,
}

impl ColumnSchema {
    /// Create a nullable column without a default.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_lowercase(),
            nullable: true,
            default: None,
        }
    }

    /// Disallow NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default expression.
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForeignKeySchema {
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub to_table: String,
    /// Referenced column.
    pub to_column: String,
}

/// A table as reported by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Primary key columns in key order.
    pub primary_key: Vec<String>,
    /// Columns in catalog order.
    pub columns: Vec<ColumnSchema>,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKeySchema>,
    /// Unique indexes, each as its comma-joined column list.
    pub unique_columns: Vec<String>,
}

impl TableSchema {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the primary key.
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a foreign key.
    pub fn foreign_key(
        mut self,
        column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKeySchema {
            column: column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        });
        self
    }

    /// Add a unique column (or comma-joined column list).
    pub fn unique(mut self, columns: impl Into<String>) -> Self {
        self.unique_columns.push(columns.into());
        self
    }
}

/// Reads the live schema through an adapter.
pub struct Introspector<'a> {
    adapter: &'a dyn Adapter,
}

impl<'a> Introspector<'a> {
    /// Create an introspector.
    pub fn new(adapter: &'a dyn Adapter) -> Self {
        Self { adapter }
    }

    fn dialect(&self) -> Dialect {
        self.adapter.dialect()
    }

    /// Whether a table exists in the current schema.
    pub async fn table_exists(&self, table: &str) -> MigrateResult<bool> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT 1 AS present FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
            Dialect::MySql => {
                "SELECT 1 AS present FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
            Dialect::Sqlite => {
                "SELECT 1 AS present FROM sqlite_master WHERE type = 'table' AND name = ?"
            }
        };
        let rows = self.adapter.query(sql, &[SqlValue::from(table)]).await?;
        Ok(!rows.is_empty())
    }

    /// User tables, sorted by name, minus `sqlite_%` and `exclude`.
    pub async fn tables(&self, exclude: &[&str]) -> MigrateResult<Vec<TableSchema>> {
        let mut tables = Vec::new();
        for name in self.table_names().await? {
            if name.starts_with("sqlite_") || exclude.contains(&name.as_str()) {
                continue;
            }
            tables.push(self.table(&name).await?);
        }
        Ok(tables)
    }

    /// Names of all base tables.
    pub async fn table_names(&self) -> MigrateResult<Vec<String>> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name"
            }
            Dialect::MySql => {
                "SELECT table_name AS table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name"
            }
            Dialect::Sqlite => {
                "SELECT name AS table_name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name"
            }
        };
        let rows = self.adapter.query(sql, &[]).await?;
        rows.iter().map(|row| required_str(row, "table_name")).collect()
    }

    /// Full description of one table.
    pub async fn table(&self, name: &str) -> MigrateResult<TableSchema> {
        match self.dialect() {
            Dialect::Sqlite => self.sqlite_table(name).await,
            Dialect::Postgres | Dialect::MySql => self.catalog_table(name).await,
        }
    }

    async fn catalog_table(&self, name: &str) -> MigrateResult<TableSchema> {
        let dialect = self.dialect();
        let param = [SqlValue::from(name)];

        let columns = self
            .adapter
            .query(&queries::columns(dialect), &param)
            .await?
            .iter()
            .map(|row| {
                Ok(ColumnSchema {
                    name: required_str(row, "column_name")?,
                    data_type: required_str(row, "data_type")?.to_lowercase(),
                    nullable: row.get_bool("is_nullable").unwrap_or(true),
                    default: optional_string(row, "column_default"),
                })
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        let primary_key = self
            .adapter
            .query(&queries::primary_key(dialect), &param)
            .await?
            .iter()
            .map(|row| required_str(row, "column_name"))
            .collect::<MigrateResult<Vec<_>>>()?;

        let foreign_keys = self
            .adapter
            .query(&queries::foreign_keys(dialect), &param)
            .await?
            .iter()
            .map(|row| {
                Ok(ForeignKeySchema {
                    column: required_str(row, "column_name")?,
                    to_table: required_str(row, "referenced_table")?,
                    to_column: required_str(row, "referenced_column")?,
                })
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        let unique_rows = self
            .adapter
            .query(&queries::unique_indexes(dialect), &param)
            .await?;
        let unique_columns = group_index_columns(&unique_rows)?;

        Ok(TableSchema {
            name: name.to_string(),
            primary_key,
            columns,
            foreign_keys,
            unique_columns,
        })
    }

    async fn sqlite_table(&self, name: &str) -> MigrateResult<TableSchema> {
        let param = [SqlValue::from(name)];

        let info = self
            .adapter
            .query(
                r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
                &param,
            )
            .await?;

        let mut columns = Vec::with_capacity(info.len());
        let mut pk: Vec<(i64, String)> = Vec::new();
        for row in &info {
            let column = required_str(row, "name")?;
            let position = row.get_i64("pk").unwrap_or(0);
            if position > 0 {
                pk.push((position, column.clone()));
            }
            columns.push(ColumnSchema {
                name: column,
                data_type: row.get_str("type").unwrap_or_default().to_lowercase(),
                nullable: !row.get_bool("notnull").unwrap_or(false),
                default: optional_string(row, "dflt_value"),
            });
        }
        pk.sort();

        let foreign_keys = self
            .adapter
            .query(
                r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
                &param,
            )
            .await?
            .iter()
            .map(|row| {
                Ok(ForeignKeySchema {
                    column: required_str(row, "from")?,
                    to_table: required_str(row, "table")?,
                    to_column: row.get_str("to").unwrap_or_default().to_string(),
                })
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        let indexes = self
            .adapter
            .query(
                r#"SELECT name, "unique", origin FROM pragma_index_list(?)"#,
                &param,
            )
            .await?;

        let mut unique_columns = Vec::new();
        for index in &indexes {
            let unique = index.get_bool("unique").unwrap_or(false);
            if !unique || index.get_str("origin") == Some("pk") {
                continue;
            }
            let index_name = required_str(index, "name")?;
            let cols = self
                .adapter
                .query(
                    "SELECT name FROM pragma_index_info(?) ORDER BY seqno",
                    &[SqlValue::from(index_name)],
                )
                .await?
                .iter()
                .map(|row| required_str(row, "name"))
                .collect::<MigrateResult<Vec<_>>>()?;
            unique_columns.push(cols.join(","));
        }

        Ok(TableSchema {
            name: name.to_string(),
            primary_key: pk.into_iter().map(|(_, c)| c).collect(),
            columns,
            foreign_keys,
            unique_columns,
        })
    }
}

fn required_str(row: &Row, column: &str) -> MigrateResult<String> {
    row.get(column)
        .filter(|v| !v.is_null())
        .map(ToString::to_string)
        .ok_or_else(|| MigrationError::database(format!("catalog row is missing '{}'", column)))
}

fn optional_string(row: &Row, column: &str) -> Option<String> {
    row.get(column)
        .filter(|v| !v.is_null())
        .map(ToString::to_string)
}

/// Collapse `(index_name, column_name)` rows into comma-joined column lists.
fn group_index_columns(rows: &[Row]) -> MigrateResult<Vec<String>> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for row in rows {
        let index = required_str(row, "index_name")?;
        let column = required_str(row, "column_name")?;
        match grouped.last_mut() {
            Some((name, cols)) if *name == index => cols.push(column),
            _ => grouped.push((index, vec![column])),
        }
    }
    Ok(grouped.into_iter().map(|(_, cols)| cols.join(",")).collect())
}

mod queries {
    use crate::dialect::Dialect;

    pub fn columns(dialect: Dialect) -> String {
        match dialect {
            Dialect::Postgres => "SELECT column_name, \
                    CASE WHEN character_maximum_length IS NOT NULL \
                         THEN data_type || '(' || character_maximum_length || ')' \
                         ELSE data_type END AS data_type, \
                    is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 \
                 ORDER BY ordinal_position"
                .to_string(),
            _ => "SELECT column_name AS column_name, column_type AS data_type, \
                    is_nullable AS is_nullable, column_default AS column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 ORDER BY ordinal_position"
                .to_string(),
        }
    }

    pub fn primary_key(dialect: Dialect) -> String {
        match dialect {
            Dialect::Postgres => "SELECT kcu.column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                  AND tc.table_name = kcu.table_name \
                 WHERE tc.constraint_type = 'PRIMARY KEY' \
                   AND tc.table_schema = current_schema() AND tc.table_name = $1 \
                 ORDER BY kcu.ordinal_position"
                .to_string(),
            _ => "SELECT column_name AS column_name \
                 FROM information_schema.key_column_usage \
                 WHERE constraint_name = 'PRIMARY' \
                   AND table_schema = DATABASE() AND table_name = ? \
                 ORDER BY ordinal_position"
                .to_string(),
        }
    }

    pub fn foreign_keys(dialect: Dialect) -> String {
        match dialect {
            Dialect::Postgres => "SELECT kcu.column_name, \
                    ccu.table_name AS referenced_table, \
                    ccu.column_name AS referenced_column \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
                 WHERE tc.constraint_type = 'FOREIGN KEY' \
                   AND tc.table_schema = current_schema() AND tc.table_name = $1 \
                 ORDER BY tc.constraint_name, kcu.ordinal_position"
                .to_string(),
            _ => "SELECT column_name AS column_name, \
                    referenced_table_name AS referenced_table, \
                    referenced_column_name AS referenced_column \
                 FROM information_schema.key_column_usage \
                 WHERE referenced_table_name IS NOT NULL \
                   AND table_schema = DATABASE() AND table_name = ? \
                 ORDER BY constraint_name, ordinal_position"
                .to_string(),
        }
    }

    pub fn unique_indexes(dialect: Dialect) -> String {
        match dialect {
            Dialect::Postgres => "SELECT i.relname AS index_name, a.attname AS column_name \
                 FROM pg_index ix \
                 JOIN pg_class t ON t.oid = ix.indrelid \
                 JOIN pg_class i ON i.oid = ix.indexrelid \
                 JOIN pg_namespace n ON n.oid = t.relnamespace \
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
                 WHERE ix.indisunique AND NOT ix.indisprimary \
                   AND n.nspname = current_schema() AND t.relname = $1 \
                 ORDER BY i.relname, array_position(ix.indkey, a.attnum)"
                .to_string(),
            _ => "SELECT index_name AS index_name, column_name AS column_name \
                 FROM information_schema.statistics \
                 WHERE non_unique = 0 AND index_name <> 'PRIMARY' \
                   AND table_schema = DATABASE() AND table_name = ? \
                 ORDER BY index_name, seq_in_index"
                .to_string(),
        }
    }
}
