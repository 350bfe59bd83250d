//! DDL Generation
//!
//! Generates Oracle DDL for tables, columns, indexes, foreign keys and the sequences that
//! back primary keys. Generated object names are shortened to fit the identifier budget;
//! names supplied by the caller are only checked.

use serde::{Deserialize, Serialize};

use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::identifier::{
    IdentifierKind, check_identifier, default_sequence_name, default_trigger_name,
    foreign_key_name, index_name,
};
use crate::sql::sanitize::{quote_column_name, quote_table_name, validate_identifier};
use crate::types::{ColumnDefinition, LogicalType};

/// Default VARCHAR2 length when a string column has no limit
pub const DEFAULT_STRING_LIMIT: u32 = 255;

/// Default RAW length when a raw column has no limit
pub const DEFAULT_RAW_LIMIT: u32 = 2000;

/// Index definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Explicit name; generated from table and columns when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            unique: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Options for CREATE TABLE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    /// Name of the generated numeric primary key column; `None` for no key
    pub primary_key: Option<String>,
    /// Create the sequence that feeds the primary key
    pub sequence: bool,
    pub sequence_start: u64,
    /// Create a trigger that fills the primary key from the sequence when it is NULL
    pub primary_key_trigger: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            primary_key: Some("id".to_string()),
            sequence: true,
            sequence_start: 1,
            primary_key_trigger: false,
        }
    }
}

/// DDL Generator for Oracle tables
pub struct DdlGenerator<'a> {
    config: &'a AdapterConfig,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new DDL generator with the given configuration
    pub fn new(config: &'a AdapterConfig) -> Self {
        Self { config }
    }

    fn budget(&self, kind: IdentifierKind) -> usize {
        self.config.identifier_budgets.for_kind(kind)
    }

    /// Validate a caller-supplied name and check it against its budget
    fn check_name(&self, kind: IdentifierKind, name: &str) -> Result<()> {
        let unqualified = name
            .split('@')
            .next()
            .and_then(|n| n.rsplit('.').next())
            .unwrap_or(name);
        validate_identifier(unqualified, &[]).map_err(AdapterError::validation)?;
        check_identifier(kind, unqualified, &self.config.identifier_budgets)
    }

    /// Sequence backing the primary key of `table`
    pub fn sequence_name(&self, table: &str) -> String {
        default_sequence_name(table, self.budget(IdentifierKind::Sequence))
    }

    /// Generate CREATE TABLE plus the sequence (and optional trigger) for its primary key
    pub fn generate_create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDefinition],
        options: &TableOptions,
    ) -> Result<Vec<String>> {
        self.check_name(IdentifierKind::Table, table_name)?;

        let mut column_defs = Vec::new();
        if let Some(pk) = &options.primary_key {
            self.check_name(IdentifierKind::Column, pk)?;
            column_defs.push(format!(
                "{} NUMBER(38,0) NOT NULL PRIMARY KEY",
                quote_column_name(pk)
            ));
        }
        for col in columns {
            self.check_name(IdentifierKind::Column, &col.name)?;
            column_defs.push(self.format_column_definition(col));
        }
        if column_defs.is_empty() {
            return Err(AdapterError::validation(format!(
                "Table '{}' needs at least one column",
                table_name
            )));
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} ({})",
            quote_table_name(table_name),
            column_defs.join(", ")
        )];

        if let Some(pk) = &options.primary_key {
            if options.sequence {
                statements.push(format!(
                    "CREATE SEQUENCE {} START WITH {}",
                    quote_column_name(&self.sequence_name(table_name)),
                    options.sequence_start
                ));
            }
            if options.primary_key_trigger {
                statements.push(self.generate_primary_key_trigger(table_name, pk));
            }
        }

        Ok(statements)
    }

    /// Generate DROP TABLE and DROP SEQUENCE for a table created by [`Self::generate_create_table`]
    pub fn generate_drop_table(&self, table_name: &str, drop_sequence: bool) -> Vec<String> {
        let mut statements = vec![format!(
            "DROP TABLE {} CASCADE CONSTRAINTS",
            quote_table_name(table_name)
        )];
        if drop_sequence {
            statements.push(format!(
                "DROP SEQUENCE {}",
                quote_column_name(&self.sequence_name(table_name))
            ));
        }
        statements
    }

    /// Trigger that fills `primary_key` from the table's sequence when an insert leaves it NULL
    pub fn generate_primary_key_trigger(&self, table_name: &str, primary_key: &str) -> String {
        let trigger = default_trigger_name(table_name, self.budget(IdentifierKind::Trigger));
        let pk = quote_column_name(primary_key);
        format!(
            "CREATE OR REPLACE TRIGGER {} BEFORE INSERT ON {} FOR EACH ROW \
             BEGIN IF :new.{} IS NULL THEN SELECT {}.NEXTVAL INTO :new.{} FROM dual; END IF; END;",
            quote_column_name(&trigger),
            quote_table_name(table_name),
            pk,
            quote_column_name(&self.sequence_name(table_name)),
            pk
        )
    }

    /// Generate ALTER TABLE statements turning `old_columns` into `new_columns`
    pub fn generate_alter_table(
        &self,
        table_name: &str,
        old_columns: &[ColumnDefinition],
        new_columns: &[ColumnDefinition],
    ) -> Result<Vec<String>> {
        let mut statements = Vec::new();

        for new_col in new_columns {
            if !old_columns.iter().any(|c| c.name == new_col.name) {
                statements.push(self.generate_add_column(table_name, new_col)?);
            }
        }

        for old_col in old_columns {
            if !new_columns.iter().any(|c| c.name == old_col.name) {
                statements.push(self.generate_remove_column(table_name, &old_col.name));
            }
        }

        for new_col in new_columns {
            if let Some(old_col) = old_columns.iter().find(|c| c.name == new_col.name) {
                if old_col != new_col {
                    statements.push(self.generate_change_column(table_name, old_col, new_col)?);
                }
            }
        }

        Ok(statements)
    }

    pub fn generate_add_column(&self, table_name: &str, col: &ColumnDefinition) -> Result<String> {
        self.check_name(IdentifierKind::Column, &col.name)?;
        Ok(format!(
            "ALTER TABLE {} ADD {}",
            quote_table_name(table_name),
            self.format_column_definition(col)
        ))
    }

    pub fn generate_remove_column(&self, table_name: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_table_name(table_name),
            quote_column_name(column_name)
        )
    }

    /// Generate ALTER TABLE ... MODIFY.
    ///
    /// The engine rejects `NULL`/`NOT NULL` when the nullability does not change, so the
    /// clause is only emitted when it differs from `old_col`.
    pub fn generate_change_column(
        &self,
        table_name: &str,
        old_col: &ColumnDefinition,
        new_col: &ColumnDefinition,
    ) -> Result<String> {
        if new_col.virtual_expression.is_some() || old_col.virtual_expression.is_some() {
            return Err(AdapterError::validation(format!(
                "Virtual column '{}' cannot be modified in place",
                new_col.name
            )));
        }

        let mut parts = vec![
            quote_column_name(&new_col.name),
            self.column_type_sql(new_col),
        ];
        match &new_col.default_value {
            Some(default) => parts.push(format!("DEFAULT {}", default)),
            None if old_col.default_value.is_some() => parts.push("DEFAULT NULL".to_string()),
            None => {}
        }
        if old_col.nullable != new_col.nullable {
            parts.push(if new_col.nullable { "NULL" } else { "NOT NULL" }.to_string());
        }

        Ok(format!(
            "ALTER TABLE {} MODIFY {}",
            quote_table_name(table_name),
            parts.join(" ")
        ))
    }

    fn resolve_index_name(&self, table_name: &str, index: &IndexDefinition) -> Result<String> {
        match &index.name {
            Some(name) => {
                self.check_name(IdentifierKind::Index, name)?;
                Ok(name.clone())
            }
            None => {
                let columns: Vec<&str> = index.columns.iter().map(String::as_str).collect();
                let table = table_name.rsplit('.').next().unwrap_or(table_name);
                index_name(table, &columns, self.budget(IdentifierKind::Index))
            }
        }
    }

    /// Generate CREATE INDEX
    pub fn generate_create_index(&self, table_name: &str, index: &IndexDefinition) -> Result<String> {
        let name = self.resolve_index_name(table_name, index)?;
        let quoted_columns: Vec<String> =
            index.columns.iter().map(|c| quote_column_name(c)).collect();
        let unique_clause = if index.unique { "UNIQUE " } else { "" };

        Ok(format!(
            "CREATE {}INDEX {} ON {} ({})",
            unique_clause,
            quote_column_name(&name),
            quote_table_name(table_name),
            quoted_columns.join(", ")
        ))
    }

    /// Generate DROP INDEX, rebuilding a generated name the same way it was created
    pub fn generate_drop_index(&self, table_name: &str, index: &IndexDefinition) -> Result<String> {
        let name = self.resolve_index_name(table_name, index)?;
        Ok(format!("DROP INDEX {}", quote_column_name(&name)))
    }

    /// Generate a foreign key from `table_name.column` to `referenced_table.referenced_column`
    pub fn generate_add_foreign_key(
        &self,
        table_name: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
        name: Option<&str>,
    ) -> Result<String> {
        let constraint = match name {
            Some(name) => {
                self.check_name(IdentifierKind::Constraint, name)?;
                name.to_string()
            }
            None => {
                let table = table_name.rsplit('.').next().unwrap_or(table_name);
                foreign_key_name(table, column, self.budget(IdentifierKind::Constraint))?
            }
        };

        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_table_name(table_name),
            quote_column_name(&constraint),
            quote_column_name(column),
            quote_table_name(referenced_table),
            quote_column_name(referenced_column)
        ))
    }

    /// Query returning the next value of `sequence`
    pub fn next_sequence_value_sql(&self, sequence: &str) -> String {
        format!("SELECT {}.NEXTVAL FROM dual", quote_table_name(sequence))
    }

    /// Engine type for a logical column type
    pub fn column_type_sql(&self, col: &ColumnDefinition) -> String {
        match col.logical_type {
            LogicalType::String => {
                format!("VARCHAR2({})", col.limit.unwrap_or(DEFAULT_STRING_LIMIT))
            }
            LogicalType::Text | LogicalType::Clob => "CLOB".to_string(),
            LogicalType::Integer => format!("NUMBER({},0)", col.limit.unwrap_or(38)),
            LogicalType::Decimal => match (col.limit, col.scale) {
                (Some(p), Some(s)) => format!("NUMBER({},{})", p, s),
                (Some(p), None) => format!("NUMBER({})", p),
                _ => "NUMBER".to_string(),
            },
            LogicalType::Float => "BINARY_DOUBLE".to_string(),
            LogicalType::Boolean => {
                if !self.config.emulation.booleans_as_numeric
                    && self.config.emulation.booleans_from_strings
                {
                    "VARCHAR2(1)".to_string()
                } else {
                    "NUMBER(1)".to_string()
                }
            }
            LogicalType::Date | LogicalType::Datetime => "DATE".to_string(),
            LogicalType::Timestamp => "TIMESTAMP(6)".to_string(),
            LogicalType::TimestampTz => "TIMESTAMP(6) WITH TIME ZONE".to_string(),
            LogicalType::RawBytes => format!("RAW({})", col.limit.unwrap_or(DEFAULT_RAW_LIMIT)),
            LogicalType::Blob => "BLOB".to_string(),
            LogicalType::Virtual => String::new(),
        }
    }

    /// Format a single column definition for CREATE TABLE or ALTER TABLE ADD
    pub fn format_column_definition(&self, col: &ColumnDefinition) -> String {
        let mut parts = vec![quote_column_name(&col.name)];

        let sql_type = self.column_type_sql(col);
        if !sql_type.is_empty() {
            parts.push(sql_type);
        }

        if let Some(expression) = &col.virtual_expression {
            parts.push(format!("GENERATED ALWAYS AS ({}) VIRTUAL", expression));
            return parts.join(" ");
        }

        // DEFAULT must precede constraints
        if let Some(default) = &col.default_value {
            parts.push(format!("DEFAULT {}", default));
        }
        if !col.nullable {
            parts.push("NOT NULL".to_string());
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Test Configuration Helpers ====================

    fn default_config() -> AdapterConfig {
        AdapterConfig::builder("//localhost/FREEPDB1").build()
    }

    fn long_names_config() -> AdapterConfig {
        AdapterConfig::builder("//localhost/FREEPDB1")
            .max_identifier_length(128)
            .build()
    }

    // ==================== CREATE TABLE Tests ====================

    #[test]
    fn test_generate_create_table_with_defaults() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);

        let columns = vec![
            ColumnDefinition::new("sku", LogicalType::String).limit(64).not_null(),
            ColumnDefinition::decimal("price", 10, 2).default("0"),
        ];

        let ddl = generator
            .generate_create_table("products", &columns, &TableOptions::default())
            .unwrap();

        assert_eq!(
            ddl[0],
            "CREATE TABLE products (id NUMBER(38,0) NOT NULL PRIMARY KEY, \
             sku VARCHAR2(64) NOT NULL, price NUMBER(10,2) DEFAULT 0)"
        );
        assert_eq!(ddl[1], "CREATE SEQUENCE products_seq START WITH 1");
        assert_eq!(ddl.len(), 2);
    }

    #[test]
    fn test_generate_create_table_without_key() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let options = TableOptions {
            primary_key: None,
            ..TableOptions::default()
        };

        let ddl = generator
            .generate_create_table(
                "events",
                &[ColumnDefinition::new("payload", LogicalType::Clob)],
                &options,
            )
            .unwrap();
        assert_eq!(ddl, vec!["CREATE TABLE events (payload CLOB)"]);
    }

    #[test]
    fn test_generate_create_table_with_trigger() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let options = TableOptions {
            primary_key_trigger: true,
            ..TableOptions::default()
        };

        let ddl = generator
            .generate_create_table(
                "orders",
                &[ColumnDefinition::new("total", LogicalType::Decimal)],
                &options,
            )
            .unwrap();
        assert_eq!(ddl.len(), 3);
        assert!(ddl[2].starts_with("CREATE OR REPLACE TRIGGER orders_pkt BEFORE INSERT ON orders"));
        assert!(ddl[2].contains("SELECT orders_seq.NEXTVAL INTO :new.id FROM dual"));
    }

    #[test]
    fn test_generate_create_table_all_column_types() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);

        let columns = vec![
            ColumnDefinition::new("str_col", LogicalType::String),
            ColumnDefinition::new("text_col", LogicalType::Text),
            ColumnDefinition::new("int_col", LogicalType::Integer),
            ColumnDefinition::new("float_col", LogicalType::Float),
            ColumnDefinition::new("bool_col", LogicalType::Boolean),
            ColumnDefinition::new("date_col", LogicalType::Date),
            ColumnDefinition::new("ts_col", LogicalType::Timestamp),
            ColumnDefinition::new("tstz_col", LogicalType::TimestampTz),
            ColumnDefinition::new("raw_col", LogicalType::RawBytes).limit(16),
            ColumnDefinition::new("blob_col", LogicalType::Blob),
        ];

        let ddl = generator
            .generate_create_table("all_types", &columns, &TableOptions::default())
            .unwrap();
        let create = &ddl[0];

        assert!(create.contains("str_col VARCHAR2(255)"));
        assert!(create.contains("text_col CLOB"));
        assert!(create.contains("int_col NUMBER(38,0)"));
        assert!(create.contains("float_col BINARY_DOUBLE"));
        assert!(create.contains("bool_col NUMBER(1)"));
        assert!(create.contains("date_col DATE"));
        assert!(create.contains("ts_col TIMESTAMP(6)"));
        assert!(create.contains("tstz_col TIMESTAMP(6) WITH TIME ZONE"));
        assert!(create.contains("raw_col RAW(16)"));
        assert!(create.contains("blob_col BLOB"));
    }

    #[test]
    fn test_generate_create_table_string_booleans() {
        let config = AdapterConfig::builder("db")
            .emulate_booleans(false)
            .emulate_booleans_from_strings(true)
            .build();
        let generator = DdlGenerator::new(&config);
        let col = ColumnDefinition::new("active", LogicalType::Boolean);
        assert_eq!(generator.column_type_sql(&col), "VARCHAR2(1)");
    }

    #[test]
    fn test_generate_create_table_virtual_column() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let col = ColumnDefinition::new("total", LogicalType::Decimal).virtual_as("price * qty");
        assert_eq!(
            generator.format_column_definition(&col),
            "total NUMBER GENERATED ALWAYS AS (price * qty) VIRTUAL"
        );
    }

    #[test]
    fn test_generate_create_table_rejects_bad_names() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let options = TableOptions::default();

        assert!(generator.generate_create_table("select", &[], &options).is_err());
        assert!(generator.generate_create_table("1table", &[], &options).is_err());

        let long = "a_very_long_table_name_exceeding_budget";
        let err = generator.generate_create_table(long, &[], &options).unwrap_err();
        assert!(matches!(err, AdapterError::IdentifierTooLong { .. }));

        let config = long_names_config();
        let generator = DdlGenerator::new(&config);
        assert!(generator.generate_create_table(long, &[], &options).is_ok());
    }

    #[test]
    fn test_quoted_reserved_column() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let options = TableOptions {
            primary_key: None,
            ..TableOptions::default()
        };
        let err = generator
            .generate_create_table("t", &[ColumnDefinition::new("level", LogicalType::Integer)], &options)
            .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    // ==================== DROP TABLE Tests ====================

    #[test]
    fn test_generate_drop_table() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);

        assert_eq!(
            generator.generate_drop_table("products", true),
            vec![
                "DROP TABLE products CASCADE CONSTRAINTS",
                "DROP SEQUENCE products_seq"
            ]
        );
        assert_eq!(generator.generate_drop_table("products", false).len(), 1);
    }

    #[test]
    fn test_sequence_name_truncates_long_tables() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let name = generator.sequence_name("customer_relationship_history");
        assert_eq!(name, "customer_relationship_hist_seq");
        assert_eq!(name.len(), 30);
    }

    // ==================== ALTER TABLE Tests ====================

    #[test]
    fn test_generate_alter_table_add_drop_modify() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);

        let old = vec![
            ColumnDefinition::new("name", LogicalType::String),
            ColumnDefinition::new("legacy", LogicalType::Integer),
        ];
        let new = vec![
            ColumnDefinition::new("name", LogicalType::String).limit(100).not_null(),
            ColumnDefinition::new("email", LogicalType::String),
        ];

        let statements = generator.generate_alter_table("users", &old, &new).unwrap();
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE users ADD email VARCHAR2(255)",
                "ALTER TABLE users DROP COLUMN legacy",
                "ALTER TABLE users MODIFY name VARCHAR2(100) NOT NULL",
            ]
        );
    }

    #[test]
    fn test_generate_alter_table_no_changes() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let cols = vec![ColumnDefinition::new("name", LogicalType::String)];
        assert!(generator.generate_alter_table("users", &cols, &cols).unwrap().is_empty());
    }

    #[test]
    fn test_generate_change_column_drops_default() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let old = ColumnDefinition::new("status", LogicalType::String).default("'new'");
        let new = ColumnDefinition::new("status", LogicalType::String);
        assert_eq!(
            generator.generate_change_column("orders", &old, &new).unwrap(),
            "ALTER TABLE orders MODIFY status VARCHAR2(255) DEFAULT NULL"
        );
    }

    // ==================== INDEX Tests ====================

    #[test]
    fn test_generate_create_index_generated_name() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let index = IndexDefinition::new(vec!["email".into()]).unique();

        assert_eq!(
            generator.generate_create_index("users", &index).unwrap(),
            "CREATE UNIQUE INDEX index_users_on_email ON users (email)"
        );
    }

    #[test]
    fn test_generate_index_name_is_shortened_and_reproducible() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        let index = IndexDefinition::new(vec![
            "customer_identifier".into(),
            "created_at".into(),
            "region".into(),
        ]);

        let create = generator.generate_create_index("customer_orders", &index).unwrap();
        let drop = generator.generate_drop_index("customer_orders", &index).unwrap();

        assert_eq!(
            create,
            "CREATE INDEX i_cus_ord_cus_ide_cre_at_reg ON customer_orders (customer_identifier, created_at, region)"
        );
        assert_eq!(drop, "DROP INDEX i_cus_ord_cus_ide_cre_at_reg");
    }

    #[test]
    fn test_generate_create_index_explicit_name_is_checked() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);

        let index = IndexDefinition::new(vec!["a".into()]).named("idx_short");
        assert!(generator.generate_create_index("t", &index).unwrap().contains("INDEX idx_short ON"));

        let index = IndexDefinition::new(vec!["a".into()]).named("x".repeat(31));
        assert!(matches!(
            generator.generate_create_index("t", &index).unwrap_err(),
            AdapterError::IdentifierTooLong { .. }
        ));
    }

    // ==================== FOREIGN KEY / SEQUENCE Tests ====================

    #[test]
    fn test_generate_add_foreign_key() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);

        assert_eq!(
            generator
                .generate_add_foreign_key("orders", "customer_id", "customers", "id", None)
                .unwrap(),
            "ALTER TABLE orders ADD CONSTRAINT orders_customer_id_fk FOREIGN KEY (customer_id) REFERENCES customers (id)"
        );
    }

    #[test]
    fn test_next_sequence_value_sql() {
        let config = default_config();
        let generator = DdlGenerator::new(&config);
        assert_eq!(
            generator.next_sequence_value_sql("orders_seq"),
            "SELECT orders_seq.NEXTVAL FROM dual"
        );
    }
}
