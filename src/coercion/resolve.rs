//! Logical type resolution
//!
//! Precedence, highest first: the descriptor's forced type, a table-level override, a
//! name heuristic whose emulation flag is on, and finally the raw type's default mapping.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::EmulationFlags;
use crate::coercion::overrides::TypeOverrideTable;
use crate::types::{ColumnDescriptor, LogicalType, is_character_type};

static ID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|_)id$").expect("id name pattern is valid"));

static DATE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|_)date(_|$)").expect("date name pattern is valid"));

static FLAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_(flag|yn)$").expect("flag name pattern is valid"));

/// Resolve the logical type of `column`
pub fn resolve_type(
    column: &ColumnDescriptor,
    overrides: &TypeOverrideTable,
    flags: &EmulationFlags,
) -> LogicalType {
    if let Some(forced) = column.forced_type {
        return forced;
    }
    if let Some(overridden) = overrides.get(&column.table_name, &column.name) {
        return overridden;
    }
    default_mapping(column, flags)
}

/// Raw type mapping including the enabled name heuristics
fn default_mapping(column: &ColumnDescriptor, flags: &EmulationFlags) -> LogicalType {
    let base = column.base_type();
    let name = column.name.as_str();

    match base.as_str() {
        "NUMBER" | "DECIMAL" | "NUMERIC" => {
            if flags.booleans_as_numeric
                && column.precision == Some(1)
                && matches!(column.scale, None | Some(0))
            {
                LogicalType::Boolean
            } else if column.scale == Some(0) {
                LogicalType::Integer
            } else if flags.integers_by_column_name && ID_NAME.is_match(name) {
                LogicalType::Integer
            } else {
                LogicalType::Decimal
            }
        }
        "INTEGER" | "INT" | "SMALLINT" => LogicalType::Integer,
        "FLOAT" | "BINARY_FLOAT" | "BINARY_DOUBLE" | "DOUBLE PRECISION" | "REAL" => {
            LogicalType::Float
        }
        b if is_character_type(b) => {
            if flags.booleans_from_strings
                && (column.length == Some(1) || FLAG_NAME.is_match(name))
            {
                LogicalType::Boolean
            } else {
                LogicalType::String
            }
        }
        "DATE" => {
            if flags.dates_by_column_name && DATE_NAME.is_match(name) {
                LogicalType::Date
            } else {
                LogicalType::Datetime
            }
        }
        b if b.starts_with("TIMESTAMP") => {
            if b.ends_with("TIME ZONE") {
                LogicalType::TimestampTz
            } else {
                LogicalType::Timestamp
            }
        }
        "RAW" | "LONG RAW" => LogicalType::RawBytes,
        "BLOB" => LogicalType::Blob,
        "CLOB" | "NCLOB" => LogicalType::Clob,
        "LONG" => LogicalType::Text,
        _ if column.virtual_column => LogicalType::Virtual,
        _ => {
            tracing::debug!(
                table = %column.table_name,
                column = %column.name,
                sql_type = %column.sql_type,
                "Unrecognized raw type, handling as string"
            );
            LogicalType::String
        }
    }
}

/// Resolves columns against one set of flags and overrides
#[derive(Debug, Clone, Default)]
pub struct TypeResolver {
    flags: EmulationFlags,
    overrides: TypeOverrideTable,
}

impl TypeResolver {
    pub fn new(flags: EmulationFlags, overrides: TypeOverrideTable) -> Self {
        Self { flags, overrides }
    }

    pub fn flags(&self) -> &EmulationFlags {
        &self.flags
    }

    pub fn overrides(&self) -> &TypeOverrideTable {
        &self.overrides
    }

    pub fn resolve(&self, column: &ColumnDescriptor) -> LogicalType {
        resolve_type(column, &self.overrides, &self.flags)
    }

    /// Fill in `logical_type` on every descriptor
    pub fn resolve_all(&self, columns: Vec<ColumnDescriptor>) -> Vec<ColumnDescriptor> {
        columns
            .into_iter()
            .map(|mut column| {
                column.logical_type = self.resolve(&column);
                column
            })
            .collect()
    }
}
