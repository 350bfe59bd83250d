//! Adapter façade
//!
//! [`OracleAdapter`] ties introspection, type coercion, statement rendering, LOB write-back
//! and the resilient connection together for the ORM layer.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};

use crate::coercion::cast::float_to_integer;
use crate::coercion::{Caster, TypeOverrideTable, TypeResolver};
use crate::config::AdapterConfig;
use crate::connection::{
    EngineSession, ExecOptions, QueryResult, ResilientConnection, open_session,
};
use crate::error::{AdapterError, Result};
use crate::lob::{LobWriteRequest, write_lobs};
use crate::sql::dml::find_column;
use crate::sql::{
    BindCollector, DdlGenerator, Membership, ROWNUM_ALIAS, RenderedStatement,
    in_list_binds, oracle_downcase, paginate, quote_column_name, quote_table_name,
    render_insert, render_update,
};
use crate::types::{ColumnDescriptor, EngineValue, LogicalType, Value};

const CURRENT_SCHEMA: &str = "SYS_CONTEXT('userenv', 'current_schema')";

const COLUMNS_SQL: &str = "SELECT column_name, data_type, data_length, char_length, \
    data_precision, data_scale, nullable, data_default, virtual_column \
    FROM all_tab_cols \
    WHERE owner = SYS_CONTEXT('userenv', 'current_schema') AND table_name = :a1 \
    AND hidden_column = 'NO' \
    ORDER BY column_id";

const PRIMARY_KEY_SQL: &str = "SELECT cc.column_name \
    FROM all_constraints c \
    JOIN all_cons_columns cc ON cc.owner = c.owner AND cc.constraint_name = c.constraint_name \
    WHERE c.owner = SYS_CONTEXT('userenv', 'current_schema') AND c.table_name = :a1 \
    AND c.constraint_type = 'P' \
    ORDER BY cc.position";

/// One row converted to ORM values, in result column order
pub type Row = Vec<(String, Value)>;

/// Oracle adapter over one resilient connection
pub struct OracleAdapter<S: EngineSession> {
    config: AdapterConfig,
    conn: ResilientConnection<S>,
    resolver: TypeResolver,
    caster: Caster,
    /// Raw dictionary metadata keyed by lower-cased table name; logical types are
    /// re-resolved on every read so later overrides take effect
    raw_columns: HashMap<String, Vec<ColumnDescriptor>>,
    primary_keys: HashMap<String, Vec<String>>,
}

impl OracleAdapter<Box<dyn EngineSession>> {
    /// Open a session for the configured backend and connect it
    pub async fn connect(config: AdapterConfig, overrides: TypeOverrideTable) -> Result<Self> {
        let session = open_session(&config)?;
        let mut adapter = Self::new(session, config, overrides)?;
        adapter.conn.connect().await?;
        info!(backend = %adapter.config.backend.name(), "Oracle adapter connected");
        Ok(adapter)
    }
}

impl<S: EngineSession> OracleAdapter<S> {
    /// Wrap an unconnected session; call [`OracleAdapter::open`] before use
    pub fn new(session: S, config: AdapterConfig, overrides: TypeOverrideTable) -> Result<Self> {
        let conn = ResilientConnection::new(session, &config)?;
        let resolver = TypeResolver::new(config.emulation, overrides);
        let caster = Caster::new(config.emulation, config.formats.clone());
        Ok(Self {
            config,
            conn,
            resolver,
            caster,
            raw_columns: HashMap::new(),
            primary_keys: HashMap::new(),
        })
    }

    pub async fn open(&mut self) -> Result<()> {
        self.conn.connect().await
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn caster(&self) -> &Caster {
        &self.caster
    }

    pub fn overrides(&self) -> &TypeOverrideTable {
        self.resolver.overrides()
    }

    pub fn connection(&self) -> &ResilientConnection<S> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut ResilientConnection<S> {
        &mut self.conn
    }

    /// DDL generator bound to this adapter's identifier budgets
    pub fn ddl(&self) -> DdlGenerator<'_> {
        DdlGenerator::new(&self.config)
    }

    /// Register a type override; visible to every adapter sharing the override table
    pub fn set_column_type(&self, table: &str, column: &str, logical_type: LogicalType) {
        self.resolver.overrides().set_type(table, column, logical_type);
    }

    /// Forget cached dictionary metadata, e.g. after DDL
    pub fn clear_schema_cache(&mut self) {
        self.raw_columns.clear();
        self.primary_keys.clear();
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Columns of `table` with resolved logical types
    pub async fn columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let key = table.to_lowercase();
        let raw = match self.raw_columns.get(&key) {
            Some(raw) => raw.clone(),
            None => {
                let raw = self.load_columns(table).await?;
                self.raw_columns.insert(key, raw.clone());
                raw
            }
        };
        Ok(self.resolver.resolve_all(raw))
    }

    /// Primary key column names of `table`, in key order
    pub async fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let key = table.to_lowercase();
        if let Some(pk) = self.primary_keys.get(&key) {
            return Ok(pk.clone());
        }

        let binds = [EngineValue::Varchar(dictionary_name(table))];
        let result = self
            .conn
            .query(PRIMARY_KEY_SQL, &binds, &ExecOptions::named("primary key"))
            .await?;
        let pk: Vec<String> = (0..result.len())
            .filter_map(|row| text_at(&result, row, "column_name"))
            .map(|name| oracle_downcase(&name))
            .collect();

        self.primary_keys.insert(key, pk.clone());
        Ok(pk)
    }

    /// Tables owned by the current schema
    pub async fn tables(&mut self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT table_name FROM all_tables WHERE owner = {} AND secondary = 'N' ORDER BY table_name",
            CURRENT_SCHEMA
        );
        let result = self
            .conn
            .query(&sql, &[], &ExecOptions::named("tables"))
            .await?;
        Ok((0..result.len())
            .filter_map(|row| text_at(&result, row, "table_name"))
            .map(|name| oracle_downcase(&name))
            .collect())
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM all_tables WHERE owner = {} AND table_name = :a1",
            CURRENT_SCHEMA
        );
        let binds = [EngineValue::Varchar(dictionary_name(table))];
        let result = self
            .conn
            .query(&sql, &binds, &ExecOptions::named("table exists"))
            .await?;
        Ok(!result.is_empty())
    }

    async fn load_columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let binds = [EngineValue::Varchar(dictionary_name(table))];
        let result = self
            .conn
            .query(COLUMNS_SQL, &binds, &ExecOptions::named("columns"))
            .await?;
        if result.is_empty() {
            return Err(AdapterError::validation(format!(
                "Table '{}' does not exist or has no visible columns",
                table
            )));
        }

        let columns = (0..result.len())
            .map(|row| dictionary_column(table, &result, row))
            .collect::<Result<Vec<_>>>()?;
        debug!(table = %table, columns = columns.len(), "Loaded column metadata");
        Ok(columns)
    }

    // ========================================================================
    // Row Writes
    // ========================================================================

    /// Insert one row, writing any LOB content in the same transaction.
    ///
    /// LOB content needs the new row's primary key, so every key column must be present in
    /// `values` when a LOB column carries data.
    pub async fn insert_row(&mut self, table: &str, values: &[(String, Value)]) -> Result<u64> {
        let columns = self.columns(table).await?;
        let statement = render_insert(table, &columns, values, &self.caster)?;
        let lobs = if statement.lob_columns.is_empty() {
            None
        } else {
            let pk = self.primary_key(table).await?;
            let key = self.key_binds(&columns, &pk, values)?;
            LobWriteRequest::build(table, key, statement.lob_columns.clone())?
        };
        self.write_row(&statement, lobs, "insert").await
    }

    /// Update the rows matching `key`, writing any LOB content in the same transaction
    pub async fn update_row(
        &mut self,
        table: &str,
        values: &[(String, Value)],
        key: &[(String, Value)],
    ) -> Result<u64> {
        let columns = self.columns(table).await?;
        let statement = render_update(table, &columns, values, key, &self.caster)?;
        let lobs = if statement.lob_columns.is_empty() {
            None
        } else {
            let names: Vec<String> = key.iter().map(|(name, _)| name.clone()).collect();
            let key = self.key_binds(&columns, &names, key)?;
            LobWriteRequest::build(table, key, statement.lob_columns.clone())?
        };
        self.write_row(&statement, lobs, "update").await
    }

    fn key_binds(
        &self,
        columns: &[ColumnDescriptor],
        key_columns: &[String],
        values: &[(String, Value)],
    ) -> Result<Vec<(String, EngineValue)>> {
        key_columns
            .iter()
            .map(|name| -> Result<(String, EngineValue)> {
                let column = find_column(columns, name).ok_or_else(|| {
                    AdapterError::validation(format!("Unknown key column '{}'", name))
                })?;
                let value = values
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
                    .unwrap_or(&Value::Null);
                Ok((column.name.clone(), self.caster.cast_in(value, column)?))
            })
            .collect()
    }

    async fn write_row(
        &mut self,
        statement: &RenderedStatement,
        lobs: Option<LobWriteRequest>,
        name: &str,
    ) -> Result<u64> {
        let opts = ExecOptions::named(name);
        let Some(lobs) = lobs else {
            return self.conn.execute(&statement.sql, &statement.binds, &opts).await;
        };

        let implicit = !self.conn.in_transaction();
        if implicit {
            self.conn.begin_transaction().await?;
        }

        let result = match self.conn.execute(&statement.sql, &statement.binds, &opts).await {
            Ok(affected) => write_lobs(&mut self.conn, &lobs).await.map(|_| affected),
            Err(err) => Err(err),
        };

        if !implicit {
            return result;
        }
        match result {
            Ok(affected) => {
                self.conn.commit().await?;
                Ok(affected)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed row write also failed");
                }
                Err(err)
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Run `sql` paginated; the synthetic row-number column is not returned
    pub async fn select_page(
        &mut self,
        sql: &str,
        binds: &[EngineValue],
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<QueryResult> {
        let paged = paginate(sql, limit, offset);
        let mut result = self
            .conn
            .query(&paged, binds, &ExecOptions::named("select page"))
            .await?;
        result.strip_column(ROWNUM_ALIAS);
        Ok(result)
    }

    /// Rows of `table` whose `column` is one of `values`.
    ///
    /// Large value sets are split into OR-ed IN lists no longer than the configured limit.
    pub async fn select_where_in(
        &mut self,
        table: &str,
        column: &str,
        values: &[Value],
    ) -> Result<QueryResult> {
        if values.is_empty() {
            return Ok(QueryResult::default());
        }

        let columns = self.columns(table).await?;
        let descriptor = find_column(&columns, column).ok_or_else(|| {
            AdapterError::validation(format!("Unknown column '{}' for table '{}'", column, table))
        })?;

        let mut engine_values = Vec::with_capacity(values.len());
        for value in values {
            let value = self.caster.cast_in(value, descriptor)?;
            if !engine_values.contains(&value) {
                engine_values.push(value);
            }
        }

        let mut binds = BindCollector::new();
        let predicate = in_list_binds(
            &quote_column_name(&descriptor.name),
            &engine_values,
            Membership::In,
            self.config.in_list_limit,
            &mut binds,
        );
        let sql = format!(
            "SELECT * FROM {} WHERE {}",
            quote_table_name(table),
            predicate
        );
        self.conn
            .query(&sql, binds.values(), &ExecOptions::named("preload"))
            .await
    }

    pub async fn next_sequence_value(&mut self, sequence: &str) -> Result<i64> {
        let sql = self.ddl().next_sequence_value_sql(sequence);
        let result = self
            .conn
            .query(&sql, &[], &ExecOptions::named("sequence"))
            .await?;
        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(engine_integer)
            .ok_or_else(|| {
                AdapterError::validation(format!("Sequence '{}' returned no value", sequence))
            })
    }

    /// Convert row `row` of `result` to ORM values using `table`'s column types.
    ///
    /// Columns not in the table, such as expressions, keep their natural type.
    pub async fn cast_row(&mut self, table: &str, result: &QueryResult, row: usize) -> Result<Row> {
        let columns = self.columns(table).await?;
        let values = result.rows.get(row).ok_or_else(|| {
            AdapterError::invalid_input(format!("Row {} is out of range", row))
        })?;

        result
            .columns
            .iter()
            .zip(values)
            .map(|(name, value)| -> Result<(String, Value)> {
                let name = oracle_downcase(name);
                let cast = match find_column(&columns, &name) {
                    Some(column) => self.caster.cast_out(value, column)?,
                    None => self.caster.cast_out_type(value, natural_type(value))?,
                };
                Ok((name, cast))
            })
            .collect()
    }

    // ========================================================================
    // Connection & Transactions
    // ========================================================================

    pub async fn begin_transaction(&mut self) -> Result<()> {
        self.conn.begin_transaction().await
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.conn.commit().await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.conn.rollback().await
    }

    /// Whether the connection answers a ping
    pub async fn active(&mut self) -> bool {
        self.conn.ping().await
    }

    /// Drop and reopen the connection, replaying session settings
    pub async fn reconnect(&mut self) -> Result<()> {
        self.conn.reset().await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.conn.disconnect().await
    }

    pub async fn execute(&mut self, sql: &str, binds: &[EngineValue]) -> Result<u64> {
        self.conn.execute(sql, binds, &ExecOptions::default()).await
    }

    pub async fn query(&mut self, sql: &str, binds: &[EngineValue]) -> Result<QueryResult> {
        self.conn.query(sql, binds, &ExecOptions::default()).await
    }
}

/// Dictionary form of a name: unquoted lower-case names are stored upper-case
fn dictionary_name(name: &str) -> String {
    if name == name.to_lowercase() {
        name.to_uppercase()
    } else {
        name.to_string()
    }
}

fn text_at(result: &QueryResult, row: usize, column: &str) -> Option<String> {
    result.get(row, column).and_then(EngineValue::to_text)
}

fn int_at(result: &QueryResult, row: usize, column: &str) -> Option<i64> {
    result.get(row, column).and_then(engine_integer)
}

fn engine_integer(value: &EngineValue) -> Option<i64> {
    match value {
        EngineValue::Number(d) => d.to_i64(),
        EngineValue::BinaryDouble(f) => float_to_integer(*f).ok(),
        other => other
            .to_text()
            .and_then(|text| Decimal::from_str(text.trim()).ok())
            .and_then(|d| d.to_i64()),
    }
}

/// Build a descriptor from one `all_tab_cols` row
fn dictionary_column(table: &str, result: &QueryResult, row: usize) -> Result<ColumnDescriptor> {
    let name = text_at(result, row, "column_name").ok_or_else(|| {
        AdapterError::validation(format!("Dictionary row {} of '{}' has no column name", row, table))
    })?;
    let data_type = text_at(result, row, "data_type").unwrap_or_else(|| "VARCHAR2".to_string());

    let mut column = ColumnDescriptor::new(oracle_downcase(&name), &data_type).table(table);

    let base = column.base_type();
    if matches!(base.as_str(), "NUMBER" | "FLOAT") {
        column.precision = int_at(result, row, "data_precision").and_then(|p| u32::try_from(p).ok());
        column.scale = int_at(result, row, "data_scale").and_then(|s| i32::try_from(s).ok());
    } else if matches!(base.as_str(), "CHAR" | "VARCHAR2" | "NCHAR" | "NVARCHAR2") {
        column.length = int_at(result, row, "char_length")
            .filter(|l| *l > 0)
            .or_else(|| int_at(result, row, "data_length"))
            .and_then(|l| u32::try_from(l).ok());
    } else if base == "RAW" {
        column.length = int_at(result, row, "data_length").and_then(|l| u32::try_from(l).ok());
    }

    column.nullable = text_at(result, row, "nullable").as_deref() != Some("N");
    column.default = text_at(result, row, "data_default")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("NULL"));
    column.virtual_column = text_at(result, row, "virtual_column").as_deref() == Some("YES");
    Ok(column)
}

/// Logical type for a value with no column to describe it
fn natural_type(value: &EngineValue) -> LogicalType {
    match value {
        EngineValue::Null | EngineValue::Varchar(_) => LogicalType::String,
        EngineValue::Number(_) => LogicalType::Decimal,
        EngineValue::BinaryDouble(_) => LogicalType::Float,
        EngineValue::Date(_) => LogicalType::Datetime,
        EngineValue::Timestamp(_) => LogicalType::Timestamp,
        EngineValue::TimestampTz(_) => LogicalType::TimestampTz,
        EngineValue::Raw(_) => LogicalType::RawBytes,
        EngineValue::Clob(_) => LogicalType::Clob,
        EngineValue::Blob(_) => LogicalType::Blob,
    }
}
