//! In-memory schema mutation records.
//!
//! These types are what a migration body builds before anything is compiled:
//! a [`TableDefinition`] collects columns and foreign keys for `CREATE TABLE`,
//! [`ColumnDefinition`] and [`IndexDefinition`] describe single operations.
//! Nothing here touches the database.

use std::fmt;
use std::str::FromStr;

use crate::error::MigrationError;

/// Abstract column types understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Variable length string (`varchar`).
    String,
    /// Unbounded text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Bigint,
    /// Double precision float.
    Float,
    /// Exact numeric with optional precision/scale.
    Decimal,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// Timestamp.
    Timestamp,
    /// Binary blob.
    Binary,
    /// JSON document.
    Json,
    /// Binary JSON (PostgreSQL).
    Jsonb,
    /// UUID.
    Uuid,
    /// IP address.
    Inet,
    /// Network block.
    Cidr,
    /// Key/value store (PostgreSQL).
    Hstore,
    /// Integer array (PostgreSQL only).
    IntegerArray,
    /// String array (PostgreSQL only).
    StringArray,
    /// Float array (PostgreSQL only).
    FloatArray,
    /// Boolean array (PostgreSQL only).
    BooleanArray,
}

impl ColumnType {
    /// Every column type.
    pub const ALL: [ColumnType; 21] = [
        ColumnType::String,
        ColumnType::Text,
        ColumnType::Integer,
        ColumnType::Bigint,
        ColumnType::Float,
        ColumnType::Decimal,
        ColumnType::Boolean,
        ColumnType::Date,
        ColumnType::Datetime,
        ColumnType::Timestamp,
        ColumnType::Binary,
        ColumnType::Json,
        ColumnType::Jsonb,
        ColumnType::Uuid,
        ColumnType::Inet,
        ColumnType::Cidr,
        ColumnType::Hstore,
        ColumnType::IntegerArray,
        ColumnType::StringArray,
        ColumnType::FloatArray,
        ColumnType::BooleanArray,
    ];

    /// The snake_case symbol used in migration sources.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Bigint => "bigint",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Timestamp => "timestamp",
            Self::Binary => "binary",
            Self::Json => "json",
            Self::Jsonb => "jsonb",
            Self::Uuid => "uuid",
            Self::Inet => "inet",
            Self::Cidr => "cidr",
            Self::Hstore => "hstore",
            Self::IntegerArray => "integer_array",
            Self::StringArray => "string_array",
            Self::FloatArray => "float_array",
            Self::BooleanArray => "boolean_array",
        }
    }

    /// Whether this is one of the array types.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::IntegerArray | Self::StringArray | Self::FloatArray | Self::BooleanArray
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| MigrationError::InvalidColumnType(s.to_string()))
    }
}

/// Column default value.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// `DEFAULT NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal, quoted when rendered.
    Text(String),
    /// Raw SQL expression such as `CURRENT_TIMESTAMP`, rendered verbatim.
    Expression(String),
}

impl DefaultValue {
    /// A raw SQL expression default.
    pub fn expr(sql: impl Into<String>) -> Self {
        Self::Expression(sql.into())
    }
}

impl From<bool> for DefaultValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for DefaultValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<i64> for DefaultValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for DefaultValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for DefaultValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A single column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Abstract type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Length limit (strings).
    pub limit: Option<u32>,
    /// Numeric precision (decimals).
    pub precision: Option<u32>,
    /// Numeric scale (decimals).
    pub scale: Option<u32>,
}

impl ColumnDefinition {
    /// Create a nullable column without a default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            limit: None,
            precision: None,
            scale: None,
        }
    }

    /// Disallow NULL.
    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    /// Set nullability.
    pub fn null(&mut self, nullable: bool) -> &mut Self {
        self.nullable = nullable;
        self
    }

    /// Set the default value.
    pub fn default(&mut self, value: impl Into<DefaultValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Set the length limit.
    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Set the numeric precision.
    pub fn precision(&mut self, precision: u32) -> &mut Self {
        self.precision = Some(precision);
        self
    }

    /// Set the numeric scale.
    pub fn scale(&mut self, scale: u32) -> &mut Self {
        self.scale = Some(scale);
        self
    }
}

/// How the implicit `id` primary key is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdType {
    /// 64-bit auto increment.
    #[default]
    BigSerial,
    /// 32-bit auto increment.
    Serial,
    /// UUID primary key.
    Uuid,
    /// No implicit `id` column.
    None,
}

/// Referential action on parent delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Delete child rows.
    Cascade,
    /// Null out the referencing column.
    SetNull,
    /// Refuse the delete.
    Restrict,
}

impl OnDelete {
    /// SQL spelling.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
        }
    }
}

/// A foreign key from one column to another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub to_table: String,
    /// Referenced column.
    pub primary_key: String,
    /// Action on delete.
    pub on_delete: Option<OnDelete>,
    /// Explicit constraint name.
    pub name: Option<String>,
}

impl ForeignKeyDefinition {
    /// Reference `to_table.id` from `column`.
    pub fn new(column: impl Into<String>, to_table: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            to_table: to_table.into(),
            primary_key: "id".to_string(),
            on_delete: None,
            name: None,
        }
    }

    /// Reference a column other than `id`.
    pub fn primary_key(&mut self, column: impl Into<String>) -> &mut Self {
        self.primary_key = column.into();
        self
    }

    /// Set the delete action.
    pub fn on_delete(&mut self, action: OnDelete) -> &mut Self {
        self.on_delete = Some(action);
        self
    }

    /// Override the synthesized constraint name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Constraint name: the explicit one, or `fk_<table>_<column>`.
    pub fn constraint_name(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("fk_{}_{}", table, self.column))
    }
}

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Indexed table.
    pub table: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Explicit index name.
    pub name: Option<String>,
}

impl IndexDefinition {
    /// Create a non-unique index.
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            name: None,
        }
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Override the synthesized name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Index name: the explicit one, or `idx_<table>_<columns>`.
    pub fn index_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("idx_{}_{}", self.table, self.columns.join("_")))
    }
}

/// Columns and constraints collected for one `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Implicit id column strategy.
    pub id_type: IdType,
    /// Declared columns in insertion order.
    pub columns: Vec<ColumnDefinition>,
    /// Declared foreign keys.
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    /// Composite primary key columns.
    pub composite_primary_key: Option<Vec<String>>,
}

impl TableDefinition {
    /// Start a table with a `bigserial` id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_type: IdType::default(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            composite_primary_key: None,
        }
    }

    /// Choose the id strategy.
    pub fn id_type(&mut self, id_type: IdType) -> &mut Self {
        self.id_type = id_type;
        self
    }

    /// Use a composite primary key. Disables the implicit id column.
    pub fn primary_key<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_type = IdType::None;
        self.composite_primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add a column of any type.
    pub fn column(&mut self, name: impl Into<String>, column_type: ColumnType) -> &mut ColumnDefinition {
        self.columns.push(ColumnDefinition::new(name, column_type));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    /// Add a `string` column.
    pub fn string(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::String)
    }

    /// Add a `text` column.
    pub fn text(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    /// Add an `integer` column.
    pub fn integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    /// Add a `bigint` column.
    pub fn bigint(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Bigint)
    }

    /// Add a `float` column.
    pub fn float(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Float)
    }

    /// Add a `decimal` column.
    pub fn decimal(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Decimal)
    }

    /// Add a `boolean` column.
    pub fn boolean(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Boolean)
    }

    /// Add a `date` column.
    pub fn date(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Date)
    }

    /// Add a `datetime` column.
    pub fn datetime(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Datetime)
    }

    /// Add a `timestamp` column.
    pub fn timestamp(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Timestamp)
    }

    /// Add a `binary` column.
    pub fn binary(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Binary)
    }

    /// Add a `json` column.
    pub fn json(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Json)
    }

    /// Add a `jsonb` column.
    pub fn jsonb(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Jsonb)
    }

    /// Add a `uuid` column.
    pub fn uuid(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Uuid)
    }

    /// Add non-null `created_at` and `updated_at` timestamps defaulting to now.
    pub fn timestamps(&mut self) -> &mut Self {
        for name in ["created_at", "updated_at"] {
            self.column(name, ColumnType::Timestamp)
                .not_null()
                .default(DefaultValue::expr("CURRENT_TIMESTAMP"));
        }
        self
    }

    /// Declare a foreign key on an existing column.
    pub fn foreign_key(
        &mut self,
        column: impl Into<String>,
        to_table: impl Into<String>,
    ) -> &mut ForeignKeyDefinition {
        self.foreign_keys
            .push(ForeignKeyDefinition::new(column, to_table));
        let last = self.foreign_keys.len() - 1;
        &mut self.foreign_keys[last]
    }

    /// Add a `<name>_id` bigint column referencing `<name>s.id`.
    pub fn references(&mut self, name: &str) -> &mut ForeignKeyDefinition {
        let column = format!("{}_id", name);
        self.column(column.clone(), ColumnType::Bigint);
        self.foreign_key(column, format!("{}s", name))
    }

    /// Names of declared columns, including the implicit id.
    pub fn column_names(&self) -> Vec<&str> {
        let id = (self.id_type != IdType::None).then_some("id");
        id.into_iter()
            .chain(self.columns.iter().map(|c| c.name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_round_trip_symbols() {
        for ty in ColumnType::ALL {
            assert_eq!(ty.as_str().parse::<ColumnType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_column_type() {
        let err = "money".parse::<ColumnType>().unwrap_err();
        assert!(matches!(err, MigrationError::InvalidColumnType(ref s) if s == "money"));
    }

    #[test]
    fn test_table_builder() {
        let mut t = TableDefinition::new("posts");
        t.string("title").not_null().limit(120);
        t.references("user").on_delete(OnDelete::Cascade);
        t.timestamps();

        assert_eq!(
            t.column_names(),
            vec!["id", "title", "user_id", "created_at", "updated_at"]
        );
        assert_eq!(t.columns[0].limit, Some(120));
        assert!(!t.columns[0].nullable);
        assert_eq!(t.foreign_keys[0].to_table, "users");
        assert_eq!(t.foreign_keys[0].constraint_name("posts"), "fk_posts_user_id");
        assert_eq!(t.foreign_keys[0].on_delete, Some(OnDelete::Cascade));
    }

    #[test]
    fn test_composite_primary_key_drops_id() {
        let mut t = TableDefinition::new("memberships");
        t.bigint("user_id");
        t.bigint("group_id");
        t.primary_key(["user_id", "group_id"]);

        assert_eq!(t.id_type, IdType::None);
        assert_eq!(t.column_names(), vec!["user_id", "group_id"]);
    }

    #[test]
    fn test_index_name() {
        let idx = IndexDefinition::new("users", ["email", "tenant_id"]).unique();
        assert_eq!(idx.index_name(), "idx_users_email_tenant_id");
        assert!(idx.unique);

        let named = IndexDefinition::new("users", ["email"]).named("users_email_key");
        assert_eq!(named.index_name(), "users_email_key");
    }
}
