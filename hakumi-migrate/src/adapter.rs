//! Database adapter contract.
//!
//! The engine never talks to a driver directly. Everything it needs from a
//! live connection is expressed by the [`Adapter`] trait, so the same runner
//! drives PostgreSQL, MySQL and SQLite connections.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::dialect::Dialect;
use crate::error::MigrateResult;

/// A value bound to a statement parameter or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Text.
    Text(String),
}

impl SqlValue {
    /// Borrow the value as a string, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read the value as an integer, accepting numeric text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read the value as a boolean.
    ///
    /// Catalog queries report flags as `1`/`0`, `YES`/`NO` or `t`/`f`
    /// depending on the engine; all of these are accepted.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Text(s) => match s.to_ascii_lowercase().as_str() {
                "yes" | "true" | "t" | "1" => Some(true),
                "no" | "false" | "f" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A result row keyed by column name, in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, SqlValue>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column value.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Insert a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.insert(column.into(), value);
    }

    /// Get a raw value.
    ///
    /// Lookup falls back to a case-insensitive match, since MySQL reports
    /// `information_schema` columns in upper case.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column).or_else(|| {
            self.values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(column))
                .map(|(_, v)| v)
        })
    }

    /// Get a value by position.
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get_index(index).map(|(_, v)| v)
    }

    /// Get a text value.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Get an integer value.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Get a boolean value.
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(SqlValue::as_bool)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A live database connection the engine can drive.
///
/// Implementations must keep one session for the adapter's lifetime: the
/// advisory lock and transactions are session scoped.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Dialect spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Execute SQL without parameters. May contain several statements.
    async fn exec(&self, sql: &str) -> MigrateResult<()>;

    /// Execute one parameterized statement, returning rows affected.
    async fn exec_params(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64>;

    /// Run a query and collect its rows.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>>;

    /// Open a transaction.
    async fn begin(&self) -> MigrateResult<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> MigrateResult<()>;

    /// Roll back the open transaction.
    async fn rollback(&self) -> MigrateResult<()>;
}

#[async_trait]
impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    async fn exec(&self, sql: &str) -> MigrateResult<()> {
        (**self).exec(sql).await
    }

    async fn exec_params(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        (**self).exec_params(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        (**self).query(sql, params).await
    }

    async fn begin(&self) -> MigrateResult<()> {
        (**self).begin().await
    }

    async fn commit(&self) -> MigrateResult<()> {
        (**self).commit().await
    }

    async fn rollback(&self) -> MigrateResult<()> {
        (**self).rollback().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new()
            .with("version", "20240101000000")
            .with("notnull", 1i64)
            .with("IS_NULLABLE", "YES")
            .with("dflt_value", SqlValue::Null);

        assert_eq!(row.get_str("version"), Some("20240101000000"));
        assert_eq!(row.get_i64("version"), Some(20240101000000));
        assert_eq!(row.get_bool("notnull"), Some(true));
        assert_eq!(row.get_bool("is_nullable"), Some(true));
        assert!(row.get("dflt_value").is_some_and(SqlValue::is_null));
        assert_eq!(row.columns().collect::<Vec<_>>().len(), 4);
    }

    #[test]
    fn test_option_into_sql_value() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
    }
}
