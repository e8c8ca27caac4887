//! DDL generation.
//!
//! [`SqlGenerator`] turns the records in [`crate::schema`] into literal SQL for
//! one [`Dialect`]. It never executes anything: every method is a pure
//! function of its arguments, and every validation error (unknown type,
//! array column outside PostgreSQL, identifier over the length limit) is
//! returned before a single statement is produced.

use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};
use crate::schema::{
    ColumnDefinition, ColumnType, DefaultValue, ForeignKeyDefinition, IdType, IndexDefinition,
    TableDefinition,
};

/// Default `varchar` length when a string column has no explicit limit.
pub const DEFAULT_STRING_LIMIT: u32 = 255;

/// Render the SQL type for a column.
pub fn column_type_sql(
    column_type: ColumnType,
    dialect: Dialect,
    limit: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
) -> MigrateResult<String> {
    let base = dialect.type_name(column_type).ok_or_else(|| {
        MigrationError::unsupported(
            format!("Array column type '{}'", column_type),
            dialect.name(),
        )
    })?;

    let sql = match column_type {
        ColumnType::String => format!("{}({})", base, limit.unwrap_or(DEFAULT_STRING_LIMIT)),
        ColumnType::StringArray => {
            format!("varchar({})[]", limit.unwrap_or(DEFAULT_STRING_LIMIT))
        }
        ColumnType::Decimal => match (precision, scale) {
            (Some(p), Some(s)) => format!("{}({},{})", base, p, s),
            (Some(p), None) => format!("{}({})", base, p),
            _ => base.to_string(),
        },
        _ => base.to_string(),
    };

    Ok(sql)
}

/// SQL generator bound to a dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlGenerator {
    dialect: Dialect,
}

impl SqlGenerator {
    /// Create a generator for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// The dialect this generator targets.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render a default value as a literal.
    pub fn default_literal(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::Bool(b) => self.dialect.boolean_literal(*b).to_string(),
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultValue::Expression(sql) => sql.clone(),
        }
    }

    /// Generate a column definition fragment.
    pub fn column_definition(&self, column: &ColumnDefinition) -> MigrateResult<String> {
        let sql_type = column_type_sql(
            column.column_type,
            self.dialect,
            column.limit,
            column.precision,
            column.scale,
        )?;

        let mut parts = vec![self.quote(&column.name), sql_type];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_literal(default)));
        }

        Ok(parts.join(" "))
    }

    /// Generate the implicit id column, if any.
    fn id_column(&self, id_type: IdType) -> Option<String> {
        let definition = match (self.dialect, id_type) {
            (_, IdType::None) => return None,
            (Dialect::Postgres, IdType::BigSerial) => "bigserial PRIMARY KEY",
            (Dialect::Postgres, IdType::Serial) => "serial PRIMARY KEY",
            (Dialect::Postgres, IdType::Uuid) => "uuid PRIMARY KEY DEFAULT gen_random_uuid()",
            (Dialect::MySql, IdType::BigSerial) => "bigint AUTO_INCREMENT PRIMARY KEY",
            (Dialect::MySql, IdType::Serial) => "int AUTO_INCREMENT PRIMARY KEY",
            (Dialect::MySql, IdType::Uuid) => "char(36) PRIMARY KEY",
            (Dialect::Sqlite, IdType::BigSerial | IdType::Serial) => {
                "INTEGER PRIMARY KEY AUTOINCREMENT"
            }
            (Dialect::Sqlite, IdType::Uuid) => "text PRIMARY KEY",
        };

        Some(format!("{} {}", self.quote("id"), definition))
    }

    /// Column and primary key entries shared by both `CREATE TABLE` forms.
    fn table_elements(&self, table: &TableDefinition) -> MigrateResult<Vec<String>> {
        let mut elements = Vec::new();

        if let Some(id) = self.id_column(table.id_type) {
            elements.push(id);
        }

        for column in &table.columns {
            elements.push(self.column_definition(column)?);
        }

        if let Some(pk) = &table.composite_primary_key {
            elements.push(format!("PRIMARY KEY ({})", self.quote_list(pk)));
        }

        Ok(elements)
    }

    /// Generate `CREATE TABLE` without foreign keys.
    pub fn create_table(&self, table: &TableDefinition) -> MigrateResult<String> {
        let elements = self.table_elements(table)?;
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote(&table.name),
            elements.join(", ")
        ))
    }

    /// Generate `CREATE TABLE` including the table's foreign keys.
    ///
    /// SQLite cannot add constraints after the fact, so its foreign keys are
    /// inlined into the `CREATE TABLE` statement. PostgreSQL and MySQL get one
    /// `ALTER TABLE ... ADD CONSTRAINT` per key after the table.
    pub fn create_table_with_foreign_keys(
        &self,
        table: &TableDefinition,
    ) -> MigrateResult<Vec<String>> {
        for fk in &table.foreign_keys {
            self.dialect.check_identifier(&fk.constraint_name(&table.name))?;
        }

        match self.dialect {
            Dialect::Sqlite => {
                let mut elements = self.table_elements(table)?;
                for fk in &table.foreign_keys {
                    elements.push(self.foreign_key_clause(&table.name, fk));
                }
                Ok(vec![format!(
                    "CREATE TABLE {} ({})",
                    self.quote(&table.name),
                    elements.join(", ")
                )])
            }
            Dialect::Postgres | Dialect::MySql => {
                let mut stmts = vec![self.create_table(table)?];
                for fk in &table.foreign_keys {
                    stmts.push(format!(
                        "ALTER TABLE {} ADD {}",
                        self.quote(&table.name),
                        self.foreign_key_clause(&table.name, fk)
                    ));
                }
                Ok(stmts)
            }
        }
    }

    /// `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` fragment.
    fn foreign_key_clause(&self, table: &str, fk: &ForeignKeyDefinition) -> String {
        let mut clause = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote(&fk.constraint_name(table)),
            self.quote(&fk.column),
            self.quote(&fk.to_table),
            self.quote(&fk.primary_key)
        );
        if let Some(action) = fk.on_delete {
            clause.push_str(" ON DELETE ");
            clause.push_str(action.as_sql());
        }
        clause
    }

    /// Generate `DROP TABLE`.
    pub fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote(name))
    }

    /// Generate `ALTER TABLE ... RENAME TO`.
    pub fn rename_table(&self, from: &str, to: &str) -> String {
        format!("ALTER TABLE {} RENAME TO {}", self.quote(from), self.quote(to))
    }

    /// Generate `ALTER TABLE ... ADD COLUMN`.
    pub fn add_column(&self, table: &str, column: &ColumnDefinition) -> MigrateResult<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote(table),
            self.column_definition(column)?
        ))
    }

    /// Generate `ALTER TABLE ... DROP COLUMN`.
    pub fn remove_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote(table),
            self.quote(column)
        )
    }

    /// Generate `ALTER TABLE ... RENAME COLUMN`.
    pub fn rename_column(&self, table: &str, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote(table),
            self.quote(from),
            self.quote(to)
        )
    }

    /// Generate a column type change.
    pub fn change_column(&self, table: &str, column: &ColumnDefinition) -> MigrateResult<String> {
        match self.dialect {
            Dialect::Postgres => {
                let sql_type = column_type_sql(
                    column.column_type,
                    self.dialect,
                    column.limit,
                    column.precision,
                    column.scale,
                )?;
                Ok(format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                    self.quote(table),
                    self.quote(&column.name),
                    sql_type
                ))
            }
            Dialect::MySql => Ok(format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                self.quote(table),
                self.column_definition(column)?
            )),
            Dialect::Sqlite => Err(MigrationError::unsupported(
                "Changing a column type",
                self.dialect.name(),
            )),
        }
    }

    /// Generate `CREATE [UNIQUE] INDEX`.
    pub fn add_index(&self, index: &IndexDefinition) -> MigrateResult<String> {
        let name = index.index_name();
        self.dialect.check_identifier(&name)?;

        let unique = if index.unique { "UNIQUE " } else { "" };
        Ok(format!(
            "CREATE {}INDEX {} ON {} ({})",
            unique,
            self.quote(&name),
            self.quote(&index.table),
            self.quote_list(&index.columns)
        ))
    }

    /// Generate `DROP INDEX`.
    pub fn remove_index(&self, index: &IndexDefinition) -> MigrateResult<String> {
        let name = index.index_name();
        self.dialect.check_identifier(&name)?;

        Ok(match self.dialect {
            Dialect::MySql => format!(
                "DROP INDEX {} ON {}",
                self.quote(&name),
                self.quote(&index.table)
            ),
            Dialect::Postgres | Dialect::Sqlite => format!("DROP INDEX {}", self.quote(&name)),
        })
    }

    /// Generate `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
    pub fn add_foreign_key(&self, table: &str, fk: &ForeignKeyDefinition) -> MigrateResult<String> {
        if self.dialect == Dialect::Sqlite {
            return Err(MigrationError::unsupported(
                "Adding a foreign key to an existing table",
                self.dialect.name(),
            ));
        }
        self.dialect.check_identifier(&fk.constraint_name(table))?;

        Ok(format!(
            "ALTER TABLE {} ADD {}",
            self.quote(table),
            self.foreign_key_clause(table, fk)
        ))
    }

    /// Generate the statement dropping a foreign key constraint.
    pub fn remove_foreign_key(
        &self,
        table: &str,
        fk: &ForeignKeyDefinition,
    ) -> MigrateResult<String> {
        let name = fk.constraint_name(table);
        self.dialect.check_identifier(&name)?;

        match self.dialect {
            Dialect::Postgres => Ok(format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.quote(table),
                self.quote(&name)
            )),
            Dialect::MySql => Ok(format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                self.quote(table),
                self.quote(&name)
            )),
            Dialect::Sqlite => Err(MigrationError::unsupported(
                "Dropping a foreign key constraint",
                self.dialect.name(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::schema::OnDelete;

    fn users_table() -> TableDefinition {
        let mut t = TableDefinition::new("users");
        t.string("name");
        t
    }

    #[test]
    fn test_create_users_postgres() {
        let sql = SqlGenerator::new(Dialect::Postgres)
            .create_table(&users_table())
            .unwrap();
        assert_eq!(
            sql,
            r#"CREATE TABLE "users" ("id" bigserial PRIMARY KEY, "name" varchar(255))"#
        );
    }

    #[test]
    fn test_create_users_mysql() {
        let sql = SqlGenerator::new(Dialect::MySql)
            .create_table(&users_table())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `users` (`id` bigint AUTO_INCREMENT PRIMARY KEY, `name` varchar(255))"
        );
    }

    #[test]
    fn test_create_users_sqlite() {
        let sql = SqlGenerator::new(Dialect::Sqlite)
            .create_table(&users_table())
            .unwrap();
        assert_eq!(
            sql,
            r#"CREATE TABLE "users" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "name" varchar(255))"#
        );
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(
            SqlGenerator::new(Dialect::Postgres).drop_table("users"),
            r#"DROP TABLE "users""#
        );
    }

    #[test]
    fn test_column_type_sql_modifiers() {
        let pg = Dialect::Postgres;
        assert_eq!(
            column_type_sql(ColumnType::String, pg, Some(40), None, None).unwrap(),
            "varchar(40)"
        );
        assert_eq!(
            column_type_sql(ColumnType::Decimal, pg, None, Some(10), Some(2)).unwrap(),
            "decimal(10,2)"
        );
        assert_eq!(
            column_type_sql(ColumnType::Decimal, pg, None, Some(10), None).unwrap(),
            "decimal(10)"
        );
        assert_eq!(
            column_type_sql(ColumnType::Decimal, pg, None, None, None).unwrap(),
            "decimal"
        );
        assert_eq!(
            column_type_sql(ColumnType::IntegerArray, pg, None, None, None).unwrap(),
            "integer[]"
        );
        assert_eq!(
            column_type_sql(ColumnType::StringArray, pg, None, None, None).unwrap(),
            "varchar(255)[]"
        );
    }

    #[test]
    fn test_column_type_sql_is_deterministic() {
        for dialect in Dialect::ALL {
            for ty in ColumnType::ALL {
                if ty.is_array() && dialect != Dialect::Postgres {
                    continue;
                }
                let first = column_type_sql(ty, dialect, Some(12), Some(8), Some(3)).unwrap();
                let second = column_type_sql(ty, dialect, Some(12), Some(8), Some(3)).unwrap();
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_array_types_rejected_outside_postgres() {
        for dialect in [Dialect::MySql, Dialect::Sqlite] {
            for ty in ColumnType::ALL.into_iter().filter(ColumnType::is_array) {
                let err = column_type_sql(ty, dialect, None, None, None).unwrap_err();
                assert!(matches!(err, MigrationError::UnsupportedFeature { .. }));
            }
        }
    }

    #[test]
    fn test_array_column_fails_create_table_before_sql() {
        let mut t = TableDefinition::new("posts");
        t.column("tags", ColumnType::StringArray);
        let err = SqlGenerator::new(Dialect::MySql).create_table(&t).unwrap_err();
        assert!(err.is_compile_error());
    }

    #[test]
    fn test_column_definition_with_default() {
        let generator = SqlGenerator::new(Dialect::Postgres);
        let mut col = ColumnDefinition::new("active", ColumnType::Boolean);
        col.not_null().default(true);
        assert_eq!(
            generator.column_definition(&col).unwrap(),
            r#""active" boolean NOT NULL DEFAULT TRUE"#
        );

        let mut col = ColumnDefinition::new("nick", ColumnType::String);
        col.default("o'neil");
        assert_eq!(
            generator.column_definition(&col).unwrap(),
            r#""nick" varchar(255) DEFAULT 'o''neil'"#
        );

        let sqlite = SqlGenerator::new(Dialect::Sqlite);
        let mut col = ColumnDefinition::new("active", ColumnType::Boolean);
        col.default(false);
        assert_eq!(
            sqlite.column_definition(&col).unwrap(),
            r#""active" boolean DEFAULT 0"#
        );
    }

    #[test]
    fn test_composite_primary_key() {
        let mut t = TableDefinition::new("memberships");
        t.bigint("user_id").not_null();
        t.bigint("group_id").not_null();
        t.primary_key(["user_id", "group_id"]);

        let sql = SqlGenerator::new(Dialect::Postgres).create_table(&t).unwrap();
        assert_eq!(
            sql,
            r#"CREATE TABLE "memberships" ("user_id" bigint NOT NULL, "group_id" bigint NOT NULL, PRIMARY KEY ("user_id", "group_id"))"#
        );
    }

    #[test]
    fn test_uuid_and_serial_ids() {
        let mut t = TableDefinition::new("tokens");
        t.id_type(IdType::Uuid);
        let pg = SqlGenerator::new(Dialect::Postgres).create_table(&t).unwrap();
        assert!(pg.contains(r#""id" uuid PRIMARY KEY DEFAULT gen_random_uuid()"#));

        t.id_type(IdType::Serial);
        let my = SqlGenerator::new(Dialect::MySql).create_table(&t).unwrap();
        assert!(my.contains("`id` int AUTO_INCREMENT PRIMARY KEY"));
    }

    #[test]
    fn test_foreign_keys_inlined_for_sqlite() {
        let mut t = TableDefinition::new("posts");
        t.string("title");
        t.references("user").on_delete(OnDelete::Cascade);

        let stmts = SqlGenerator::new(Dialect::Sqlite)
            .create_table_with_foreign_keys(&t)
            .unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            stmts[0],
            r#"CREATE TABLE "posts" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "title" varchar(255), "user_id" bigint, CONSTRAINT "fk_posts_user_id" FOREIGN KEY ("user_id") REFERENCES "users" ("id") ON DELETE CASCADE)"#
        );
    }

    #[test]
    fn test_foreign_keys_altered_for_postgres_and_mysql() {
        let mut t = TableDefinition::new("posts");
        t.references("user").on_delete(OnDelete::SetNull);

        let pg = SqlGenerator::new(Dialect::Postgres)
            .create_table_with_foreign_keys(&t)
            .unwrap();
        assert_eq!(pg.len(), 2);
        assert!(!pg[0].contains("FOREIGN KEY"));
        assert_eq!(
            pg[1],
            r#"ALTER TABLE "posts" ADD CONSTRAINT "fk_posts_user_id" FOREIGN KEY ("user_id") REFERENCES "users" ("id") ON DELETE SET NULL"#
        );

        let my = SqlGenerator::new(Dialect::MySql)
            .create_table_with_foreign_keys(&t)
            .unwrap();
        assert_eq!(my.len(), 2);
        assert!(my[1].starts_with("ALTER TABLE `posts` ADD CONSTRAINT `fk_posts_user_id`"));
    }

    #[test]
    fn test_foreign_key_name_too_long_rejected_before_sql() {
        let table = "t".repeat(50);
        let mut t = TableDefinition::new(table);
        t.foreign_key("a_rather_long_column_name", "parents");

        let err = SqlGenerator::new(Dialect::Postgres)
            .create_table_with_foreign_keys(&t)
            .unwrap_err();
        assert!(matches!(err, MigrationError::IdentifierTooLong { limit: 63, .. }));
    }

    #[test]
    fn test_index_name_limit_boundary() {
        let generator = SqlGenerator::new(Dialect::Postgres);

        // "idx_" + table + "_" + "c" => 4 + len + 2
        let ok = IndexDefinition::new("t".repeat(57), ["c"]);
        assert_eq!(ok.index_name().len(), 63);
        assert!(generator.add_index(&ok).is_ok());

        let too_long = IndexDefinition::new("t".repeat(58), ["c"]);
        assert_eq!(too_long.index_name().len(), 64);
        let err = generator.add_index(&too_long).unwrap_err();
        assert!(matches!(err, MigrationError::IdentifierTooLong { length: 64, .. }));

        // MySQL allows 64.
        assert!(SqlGenerator::new(Dialect::MySql).add_index(&too_long).is_ok());
    }

    #[test]
    fn test_index_statements() {
        let idx = IndexDefinition::new("users", ["email"]).unique();
        assert_eq!(
            SqlGenerator::new(Dialect::Postgres).add_index(&idx).unwrap(),
            r#"CREATE UNIQUE INDEX "idx_users_email" ON "users" ("email")"#
        );
        assert_eq!(
            SqlGenerator::new(Dialect::Postgres).remove_index(&idx).unwrap(),
            r#"DROP INDEX "idx_users_email""#
        );
        assert_eq!(
            SqlGenerator::new(Dialect::MySql).remove_index(&idx).unwrap(),
            "DROP INDEX `idx_users_email` ON `users`"
        );
    }

    #[test]
    fn test_alter_statements() {
        let generator = SqlGenerator::new(Dialect::Postgres);
        let mut age = ColumnDefinition::new("age", ColumnType::Integer);
        age.not_null().default(0);

        assert_eq!(
            generator.add_column("users", &age).unwrap(),
            r#"ALTER TABLE "users" ADD COLUMN "age" integer NOT NULL DEFAULT 0"#
        );
        assert_eq!(
            generator.remove_column("users", "age"),
            r#"ALTER TABLE "users" DROP COLUMN "age""#
        );
        assert_eq!(
            generator.rename_column("users", "name", "full_name"),
            r#"ALTER TABLE "users" RENAME COLUMN "name" TO "full_name""#
        );
        assert_eq!(
            generator.rename_table("users", "accounts"),
            r#"ALTER TABLE "users" RENAME TO "accounts""#
        );
        assert_eq!(
            generator
                .change_column("users", &ColumnDefinition::new("age", ColumnType::Bigint))
                .unwrap(),
            r#"ALTER TABLE "users" ALTER COLUMN "age" TYPE bigint"#
        );
    }

    #[test]
    fn test_change_column_per_dialect() {
        let col = ColumnDefinition::new("age", ColumnType::Bigint);
        assert_eq!(
            SqlGenerator::new(Dialect::MySql)
                .change_column("users", &col)
                .unwrap(),
            "ALTER TABLE `users` MODIFY COLUMN `age` bigint"
        );
        assert!(matches!(
            SqlGenerator::new(Dialect::Sqlite).change_column("users", &col),
            Err(MigrationError::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_foreign_key_alterations() {
        let fk = ForeignKeyDefinition::new("user_id", "users");

        assert_eq!(
            SqlGenerator::new(Dialect::Postgres)
                .remove_foreign_key("posts", &fk)
                .unwrap(),
            r#"ALTER TABLE "posts" DROP CONSTRAINT "fk_posts_user_id""#
        );
        assert_eq!(
            SqlGenerator::new(Dialect::MySql)
                .remove_foreign_key("posts", &fk)
                .unwrap(),
            "ALTER TABLE `posts` DROP FOREIGN KEY `fk_posts_user_id`"
        );
        assert!(SqlGenerator::new(Dialect::Sqlite).add_foreign_key("posts", &fk).is_err());
        assert!(
            SqlGenerator::new(Dialect::Sqlite)
                .remove_foreign_key("posts", &fk)
                .is_err()
        );
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let generator = SqlGenerator::new(Dialect::Postgres);
        assert_eq!(
            generator.drop_table("bad\"name"),
            r#"DROP TABLE "bad""name""#
        );
    }
}
