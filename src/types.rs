//! Core type definitions for the compatibility layer
//!
//! Includes logical column types, the ORM-side and engine-side value representations,
//! introspected column descriptors and DDL column definitions.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Logical types
// ============================================================================

/// Logical type a raw engine column represents to the ORM layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    String,
    Text,
    Integer,
    Decimal,
    Float,
    Boolean,
    Date,
    Datetime,
    Timestamp,
    TimestampTz,
    RawBytes,
    Blob,
    Clob,
    /// Computed column with no storable representation
    Virtual,
}

impl LogicalType {
    /// Whether values of this type are written through LOB write-back
    pub fn is_lob(self) -> bool {
        matches!(self, LogicalType::Blob | LogicalType::Clob)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            LogicalType::Integer | LogicalType::Decimal | LogicalType::Float
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            LogicalType::Date
                | LogicalType::Datetime
                | LogicalType::Timestamp
                | LogicalType::TimestampTz
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogicalType::String => "string",
            LogicalType::Text => "text",
            LogicalType::Integer => "integer",
            LogicalType::Decimal => "decimal",
            LogicalType::Float => "float",
            LogicalType::Boolean => "boolean",
            LogicalType::Date => "date",
            LogicalType::Datetime => "datetime",
            LogicalType::Timestamp => "timestamp",
            LogicalType::TimestampTz => "timestamp_tz",
            LogicalType::RawBytes => "raw",
            LogicalType::Blob => "blob",
            LogicalType::Clob => "clob",
            LogicalType::Virtual => "virtual",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Values
// ============================================================================

/// ORM-side value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(Decimal),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Bytes(Vec<u8>),
    /// Structured value persisted in its serialized text form
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or a string that is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Engine-side value, shaped after the engine's native types
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    /// NUMBER
    Number(Decimal),
    /// BINARY_FLOAT / BINARY_DOUBLE
    BinaryDouble(f64),
    /// CHAR / VARCHAR2 / NCHAR / NVARCHAR2 / LONG
    Varchar(String),
    /// DATE, which always carries a time of day
    Date(NaiveDateTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Raw(Vec<u8>),
    Clob(String),
    Blob(Vec<u8>),
}

impl EngineValue {
    pub fn is_null(&self) -> bool {
        matches!(self, EngineValue::Null)
    }

    /// Text form used by drivers that bind every parameter as a string
    pub fn to_text(&self) -> Option<String> {
        match self {
            EngineValue::Null => None,
            EngineValue::Number(d) => Some(d.to_string()),
            EngineValue::BinaryDouble(f) => Some(f.to_string()),
            EngineValue::Varchar(s) | EngineValue::Clob(s) => Some(s.clone()),
            EngineValue::Date(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            EngineValue::Timestamp(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
            EngineValue::TimestampTz(dt) => {
                Some(dt.format("%Y-%m-%d %H:%M:%S%.6f %:z").to_string())
            }
            EngineValue::Raw(b) | EngineValue::Blob(b) => Some(hex_upper(b)),
        }
    }
}

pub(crate) fn hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

// ============================================================================
// Introspected columns
// ============================================================================

static RAW_TYPE_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*([a-z_][a-z0-9_]*(?:\s+[a-z_][a-z0-9_]*)*)\s*(?:\(\s*(\d+)\s*(?:,\s*(-?\d+)\s*)?(?:BYTE|CHAR)?\s*\))?\s*(.*)$",
    )
    .expect("raw type pattern is valid")
});

/// Raw engine types whose values are written through LOB write-back
pub const LOB_RAW_TYPES: &[&str] = &["CLOB", "NCLOB", "BLOB"];

/// Column metadata as reported by the engine plus the resolved logical type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as the ORM layer sees it
    pub name: String,
    /// Owning table
    pub table_name: String,
    /// Raw engine type, e.g. `NUMBER(10,2)` or `TIMESTAMP(6) WITH TIME ZONE`
    pub sql_type: String,
    /// Declared precision (numbers) or length (characters, raw)
    pub precision: Option<u32>,
    pub scale: Option<i32>,
    pub length: Option<u32>,
    pub nullable: bool,
    /// Default expression as stored in the data dictionary
    pub default: Option<String>,
    /// Computed column, not storable
    #[serde(rename = "virtual")]
    pub virtual_column: bool,
    /// Per-instance forced type; beats every other rule
    pub forced_type: Option<LogicalType>,
    /// Logical type as last resolved
    pub logical_type: LogicalType,
}

impl ColumnDescriptor {
    /// Create a descriptor from a name and raw type, parsing declared arguments out of the type
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let sql_type = sql_type.into();
        let (precision, scale) = parse_type_args(&sql_type);
        let base = base_type_of(&sql_type);
        let is_numeric = matches!(base.as_str(), "NUMBER" | "FLOAT" | "DECIMAL" | "NUMERIC");

        Self {
            name: name.into(),
            table_name: String::new(),
            length: if is_numeric { None } else { precision },
            precision: if is_numeric { precision } else { None },
            scale: if is_numeric { scale } else { None },
            sql_type,
            nullable: true,
            default: None,
            virtual_column: false,
            forced_type: None,
            logical_type: LogicalType::String,
        }
    }

    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn virtual_column(mut self) -> Self {
        self.virtual_column = true;
        self
    }

    pub fn force_type(mut self, logical_type: LogicalType) -> Self {
        self.forced_type = Some(logical_type);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: i32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Raw type without its arguments, upper-cased: `TIMESTAMP(6) WITH TIME ZONE` → `TIMESTAMP WITH TIME ZONE`
    pub fn base_type(&self) -> String {
        base_type_of(&self.sql_type)
    }

    /// LOB flag, derived from the raw type
    pub fn is_lob(&self) -> bool {
        LOB_RAW_TYPES.contains(&self.base_type().as_str())
    }

    /// Whether booleans in this column are stored as `Y`/`N` rather than `1`/`0`
    pub fn stores_boolean_as_char(&self) -> bool {
        is_character_type(&self.base_type())
    }
}

pub(crate) fn is_character_type(base: &str) -> bool {
    matches!(base, "CHAR" | "VARCHAR2" | "VARCHAR" | "NCHAR" | "NVARCHAR2")
}

fn parse_type_args(sql_type: &str) -> (Option<u32>, Option<i32>) {
    RAW_TYPE_ARGS
        .captures(sql_type)
        .map(|caps| {
            let first = caps.get(2).and_then(|m| m.as_str().parse().ok());
            let second = caps.get(3).and_then(|m| m.as_str().parse().ok());
            (first, second)
        })
        .unwrap_or((None, None))
}

fn base_type_of(sql_type: &str) -> String {
    match RAW_TYPE_ARGS.captures(sql_type) {
        Some(caps) => {
            let head = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let tail = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
            let joined = format!("{} {}", head, tail);
            joined
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase()
        }
        None => sql_type.trim().to_uppercase(),
    }
}

// ============================================================================
// DDL column definitions
// ============================================================================

/// Column definition used when generating DDL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub logical_type: LogicalType,

    /// Length for strings and raw columns, precision for decimals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Default value (SQL expression, e.g. `0`, `SYSDATE`, `'active'`)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "default")]
    pub default_value: Option<String>,

    /// Expression for a virtual column
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "as")]
    pub virtual_expression: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            limit: None,
            scale: None,
            nullable: true,
            default_value: None,
            virtual_expression: None,
        }
    }

    pub fn decimal(name: impl Into<String>, precision: u32, scale: u32) -> Self {
        let mut col = Self::new(name, LogicalType::Decimal);
        col.limit = Some(precision);
        col.scale = Some(scale);
        col
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn virtual_as(mut self, expression: impl Into<String>) -> Self {
        self.virtual_expression = Some(expression.into());
        self
    }
}
