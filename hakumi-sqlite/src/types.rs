//! Conversion between engine values and SQLite values.

use hakumi_migrate::{Row, SqlValue};
use rusqlite::types::{Value, ValueRef};

/// Convert an engine value to a SQLite value.
pub fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

/// Convert a SQLite value to an engine value.
///
/// Blobs are read as lossy UTF-8 text.
pub fn from_sqlite_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Read every column of `row` into an engine [`Row`].
pub fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (i, column) in columns.iter().enumerate() {
        out.insert(column.clone(), from_sqlite_value(row.get_ref(i)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sqlite_value() {
        assert!(matches!(to_sqlite_value(&SqlValue::Null), Value::Null));
        assert!(matches!(to_sqlite_value(&SqlValue::Bool(true)), Value::Integer(1)));
        assert!(matches!(to_sqlite_value(&SqlValue::Bool(false)), Value::Integer(0)));
        assert!(matches!(to_sqlite_value(&SqlValue::Int(42)), Value::Integer(42)));
        assert!(matches!(
            to_sqlite_value(&SqlValue::from("20240101000000")),
            Value::Text(s) if s == "20240101000000"
        ));
    }

    #[test]
    fn test_from_sqlite_value() {
        assert_eq!(from_sqlite_value(ValueRef::Null), SqlValue::Null);
        assert_eq!(from_sqlite_value(ValueRef::Integer(7)), SqlValue::Int(7));
        assert_eq!(from_sqlite_value(ValueRef::Real(1.5)), SqlValue::Float(1.5));
        assert_eq!(
            from_sqlite_value(ValueRef::Text(b"users")),
            SqlValue::Text("users".into())
        );
        assert_eq!(
            from_sqlite_value(ValueRef::Blob(b"raw")),
            SqlValue::Text("raw".into())
        );
    }

    #[test]
    fn test_read_row() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let columns = vec!["version".to_string(), "flag".to_string(), "gone".to_string()];
        let row = conn
            .query_row("SELECT '20240101000000', 1, NULL", [], |r| read_row(r, &columns))
            .unwrap();

        assert_eq!(row.get_str("version"), Some("20240101000000"));
        assert_eq!(row.get_bool("flag"), Some(true));
        assert!(row.get("gone").is_some_and(SqlValue::is_null));
    }
}
