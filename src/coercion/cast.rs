//! Bidirectional value casting between ORM values and engine values

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::{EmulationFlags, FormatMasks};
use crate::error::{AdapterError, Result};
use crate::types::{ColumnDescriptor, EngineValue, LogicalType, Value};

/// Tokens read as `true`; any other non-blank input reads as `false`
const TRUTHY_TOKENS: &[&str] = &["true", "t", "1", "y", "yes", "+"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIMESTAMP_TZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f %:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// How booleans are stored in a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BooleanStorage {
    /// `1` / `0` in a numeric column
    Numeric,
    /// `Y` / `N` in a character column
    Char,
}

/// Casts values in and out of the engine according to logical column types
#[derive(Debug, Clone, Default)]
pub struct Caster {
    flags: EmulationFlags,
    formats: FormatMasks,
}

impl Caster {
    pub fn new(flags: EmulationFlags, formats: FormatMasks) -> Self {
        Self { flags, formats }
    }

    pub fn flags(&self) -> &EmulationFlags {
        &self.flags
    }

    /// Cast an ORM value for writing into `column`
    pub fn cast_in(&self, value: &Value, column: &ColumnDescriptor) -> Result<EngineValue> {
        let storage = if column.stores_boolean_as_char() {
            BooleanStorage::Char
        } else {
            BooleanStorage::Numeric
        };
        self.cast_in_with(value, column.logical_type, storage)
            .map_err(|message| AdapterError::cast(&column.name, message))
    }

    /// Cast an ORM value for a bare logical type; booleans are stored numerically
    pub fn cast_in_type(&self, value: &Value, logical: LogicalType) -> Result<EngineValue> {
        self.cast_in_with(value, logical, BooleanStorage::Numeric)
            .map_err(|message| AdapterError::cast(logical.as_str(), message))
    }

    /// Cast an engine value read from `column`
    pub fn cast_out(&self, value: &EngineValue, column: &ColumnDescriptor) -> Result<Value> {
        self.cast_out_with(value, column.logical_type)
            .map_err(|message| AdapterError::cast(&column.name, message))
    }

    pub fn cast_out_type(&self, value: &EngineValue, logical: LogicalType) -> Result<Value> {
        self.cast_out_with(value, logical)
            .map_err(|message| AdapterError::cast(logical.as_str(), message))
    }

    /// Whether assigning `new` over `old` changes the stored value of `column`.
    ///
    /// Both sides are normalised through a cast-in/cast-out round trip, so `"42"` over `42`
    /// is no change while a blank string over `0` in a nullable numeric column is a change
    /// to NULL. A value that cannot be cast counts as changed.
    pub fn attribute_changed(&self, column: &ColumnDescriptor, old: &Value, new: &Value) -> bool {
        let normalize = |value: &Value| {
            self.cast_in(value, column)
                .and_then(|engine| self.cast_out(&engine, column))
        };
        match (normalize(old), normalize(new)) {
            (Ok(old), Ok(new)) => old != new,
            _ => true,
        }
    }

    // ------------------------------------------------------------------------
    // Casting in
    // ------------------------------------------------------------------------

    fn cast_in_with(
        &self,
        value: &Value,
        logical: LogicalType,
        storage: BooleanStorage,
    ) -> std::result::Result<EngineValue, String> {
        if value.is_null() {
            return Ok(EngineValue::Null);
        }

        match logical {
            LogicalType::String | LogicalType::Text => Ok(EngineValue::Varchar(value_to_text(value)?)),
            LogicalType::Clob => Ok(EngineValue::Clob(value_to_text(value)?)),
            LogicalType::Integer => Ok(match self.integer_in(value)? {
                Some(i) => EngineValue::Number(Decimal::from(i)),
                None => EngineValue::Null,
            }),
            LogicalType::Decimal => Ok(match decimal_in(value)? {
                Some(d) => EngineValue::Number(d),
                None => EngineValue::Null,
            }),
            LogicalType::Float => Ok(match float_in(value)? {
                Some(f) => EngineValue::BinaryDouble(f),
                None => EngineValue::Null,
            }),
            LogicalType::Boolean => Ok(match boolean_in(value)? {
                Some(b) => match storage {
                    BooleanStorage::Numeric => EngineValue::Number(Decimal::from(b as i64)),
                    BooleanStorage::Char => {
                        EngineValue::Varchar(if b { "Y" } else { "N" }.to_string())
                    }
                },
                None => EngineValue::Null,
            }),
            LogicalType::Date => Ok(match value {
                Value::Date(d) => EngineValue::Date(d.and_time(NaiveTime::MIN)),
                Value::String(s) if s.trim().is_empty() => EngineValue::Null,
                Value::String(s) => EngineValue::Date(self.parse_date_or_datetime(s)?),
                other => EngineValue::Date(self.datetime_in(other)?),
            }),
            LogicalType::Datetime => Ok(match self.optional_datetime_in(value)? {
                Some(dt) => EngineValue::Date(dt),
                None => EngineValue::Null,
            }),
            LogicalType::Timestamp => Ok(match self.optional_datetime_in(value)? {
                Some(dt) => EngineValue::Timestamp(dt),
                None => EngineValue::Null,
            }),
            LogicalType::TimestampTz => Ok(match value {
                Value::TimestampTz(t) => EngineValue::TimestampTz(*t),
                Value::String(s) if s.trim().is_empty() => EngineValue::Null,
                Value::String(s) => EngineValue::TimestampTz(self.parse_timestamp_tz(s)?),
                other => EngineValue::TimestampTz(self.datetime_in(other)?.and_utc().fixed_offset()),
            }),
            LogicalType::RawBytes => Ok(EngineValue::Raw(bytes_in(value)?)),
            LogicalType::Blob => Ok(EngineValue::Blob(bytes_in(value)?)),
            LogicalType::Virtual => Err("virtual columns cannot be written".to_string()),
        }
    }

    fn integer_in(&self, value: &Value) -> std::result::Result<Option<i64>, String> {
        match value {
            Value::Integer(i) => Ok(Some(*i)),
            Value::Bool(b) => Ok(Some(*b as i64)),
            Value::Decimal(d) => d
                .trunc()
                .to_i64()
                .map(Some)
                .ok_or_else(|| format!("{} is out of integer range", d)),
            Value::Float(f) => float_to_integer(*f).map(Some),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => parse_integer(s).map(Some),
            other => Err(format!("cannot cast {:?} to integer", other)),
        }
    }

    fn optional_datetime_in(&self, value: &Value) -> std::result::Result<Option<NaiveDateTime>, String> {
        match value {
            Value::String(s) if s.trim().is_empty() => Ok(None),
            other => self.datetime_in(other).map(Some),
        }
    }

    fn datetime_in(&self, value: &Value) -> std::result::Result<NaiveDateTime, String> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::TimestampTz(t) => Ok(t.naive_local()),
            Value::String(s) => self.parse_date_or_datetime(s),
            other => Err(format!("cannot cast {:?} to a date-time", other)),
        }
    }

    // ------------------------------------------------------------------------
    // Casting out
    // ------------------------------------------------------------------------

    fn cast_out_with(&self, value: &EngineValue, logical: LogicalType) -> std::result::Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match logical {
            LogicalType::String | LogicalType::Text | LogicalType::Clob => Ok(Value::String(
                value.to_text().unwrap_or_default(),
            )),
            LogicalType::Integer => match value {
                EngineValue::Number(d) => d
                    .trunc()
                    .to_i64()
                    .map(Value::Integer)
                    .ok_or_else(|| format!("{} is out of integer range", d)),
                EngineValue::BinaryDouble(f) => float_to_integer(*f).map(Value::Integer),
                EngineValue::Varchar(s) => parse_integer(s).map(Value::Integer),
                other => Err(format!("unexpected {:?} for integer column", other)),
            },
            LogicalType::Decimal => match value {
                EngineValue::Number(d) => Ok(Value::Decimal(*d)),
                EngineValue::BinaryDouble(f) => float_to_decimal(*f).map(Value::Decimal),
                EngineValue::Varchar(s) => parse_decimal(s).map(Value::Decimal),
                other => Err(format!("unexpected {:?} for decimal column", other)),
            },
            LogicalType::Float => match value {
                EngineValue::Number(d) => d
                    .to_f64()
                    .map(Value::Float)
                    .ok_or_else(|| format!("{} is not representable as a float", d)),
                EngineValue::BinaryDouble(f) => Ok(Value::Float(*f)),
                EngineValue::Varchar(s) => parse_float(s).map(Value::Float),
                other => Err(format!("unexpected {:?} for float column", other)),
            },
            LogicalType::Boolean => match value {
                EngineValue::Number(d) => Ok(Value::Bool(!d.is_zero())),
                EngineValue::BinaryDouble(f) => Ok(Value::Bool(*f != 0.0)),
                EngineValue::Varchar(s) => Ok(parse_boolean(s).map(Value::Bool).unwrap_or(Value::Null)),
                other => Err(format!("unexpected {:?} for boolean column", other)),
            },
            LogicalType::Date => {
                let dt = self.engine_datetime(value)?;
                if is_midnight(&dt) {
                    Ok(Value::Date(dt.date()))
                } else {
                    Ok(Value::DateTime(dt))
                }
            }
            LogicalType::Datetime | LogicalType::Timestamp => {
                self.engine_datetime(value).map(Value::DateTime)
            }
            LogicalType::TimestampTz => match value {
                EngineValue::TimestampTz(t) => Ok(Value::TimestampTz(*t)),
                EngineValue::Varchar(s) => self.parse_timestamp_tz(s).map(Value::TimestampTz),
                other => self
                    .engine_datetime(other)
                    .map(|dt| Value::TimestampTz(dt.and_utc().fixed_offset())),
            },
            LogicalType::RawBytes | LogicalType::Blob => match value {
                EngineValue::Raw(b) | EngineValue::Blob(b) => Ok(Value::Bytes(b.clone())),
                // Text-mode drivers return binary data hex encoded
                EngineValue::Varchar(s) => hex::decode(s.trim())
                    .map(Value::Bytes)
                    .map_err(|e| format!("invalid hex data: {}", e)),
                other => Err(format!("unexpected {:?} for binary column", other)),
            },
            LogicalType::Virtual => Ok(natural_value(value)),
        }
    }

    fn engine_datetime(&self, value: &EngineValue) -> std::result::Result<NaiveDateTime, String> {
        match value {
            EngineValue::Date(dt) | EngineValue::Timestamp(dt) => Ok(*dt),
            EngineValue::TimestampTz(t) => Ok(t.naive_local()),
            EngineValue::Varchar(s) => self.parse_date_or_datetime(s),
            other => Err(format!("unexpected {:?} for temporal column", other)),
        }
    }

    // ------------------------------------------------------------------------
    // Text parsing
    // ------------------------------------------------------------------------

    /// Parse a user-entered date or date-time, trying the configured masks first
    fn parse_date_or_datetime(&self, input: &str) -> std::result::Result<NaiveDateTime, String> {
        let s = input.trim();

        if let Some(mask) = &self.formats.string_to_time {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, mask) {
                return Ok(dt);
            }
        }
        if let Some(mask) = &self.formats.string_to_date {
            if let Ok(d) = NaiveDate::parse_from_str(s, mask) {
                return Ok(d.and_time(NaiveTime::MIN));
            }
        }
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(dt);
            }
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(d.and_time(NaiveTime::MIN));
        }
        if let Ok(t) = self.parse_timestamp_tz(s) {
            return Ok(t.naive_local());
        }
        Err(format!("'{}' is not a recognizable date or time", input))
    }

    fn parse_timestamp_tz(&self, input: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
        let s = input.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(s) {
            return Ok(t);
        }
        TIMESTAMP_TZ_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(s, format).ok())
            .ok_or_else(|| format!("'{}' is not a recognizable timestamp with time zone", input))
    }
}

/// Truncate a float to an integer, rejecting values outside the `i64` range
pub(crate) fn float_to_integer(f: f64) -> std::result::Result<i64, String> {
    f.trunc()
        .to_i64()
        .ok_or_else(|| format!("{} is out of integer range", f))
}

/// Read a boolean from the fixed vocabulary; blank input is no value
pub fn parse_boolean(input: &str) -> Option<bool> {
    let token = input.trim();
    if token.is_empty() {
        return None;
    }
    Some(
        TRUTHY_TOKENS
            .iter()
            .any(|truthy| token.eq_ignore_ascii_case(truthy)),
    )
}

fn boolean_in(value: &Value) -> std::result::Result<Option<bool>, String> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Integer(i) => Ok(Some(*i != 0)),
        Value::Decimal(d) => Ok(Some(!d.is_zero())),
        Value::Float(f) => Ok(Some(*f != 0.0)),
        Value::String(s) => Ok(parse_boolean(s)),
        other => Err(format!("cannot cast {:?} to boolean", other)),
    }
}

fn decimal_in(value: &Value) -> std::result::Result<Option<Decimal>, String> {
    match value {
        Value::Decimal(d) => Ok(Some(*d)),
        Value::Integer(i) => Ok(Some(Decimal::from(*i))),
        Value::Bool(b) => Ok(Some(Decimal::from(*b as i64))),
        Value::Float(f) => float_to_decimal(*f).map(Some),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_decimal(s).map(Some),
        other => Err(format!("cannot cast {:?} to decimal", other)),
    }
}

fn float_in(value: &Value) -> std::result::Result<Option<f64>, String> {
    match value {
        Value::Float(f) => Ok(Some(*f)),
        Value::Integer(i) => Ok(Some(*i as f64)),
        Value::Decimal(d) => d
            .to_f64()
            .map(Some)
            .ok_or_else(|| format!("{} is not representable as a float", d)),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_float(s).map(Some),
        other => Err(format!("cannot cast {:?} to float", other)),
    }
}

fn bytes_in(value: &Value) -> std::result::Result<Vec<u8>, String> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(format!("cannot cast {:?} to binary data", other)),
    }
}

/// Text form of an ORM value for character columns
pub(crate) fn value_to_text(value: &Value) -> std::result::Result<String, String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        Value::TimestampTz(t) => t.to_rfc3339(),
        Value::Bytes(b) => {
            String::from_utf8(b.clone()).map_err(|_| "binary data is not valid UTF-8".to_string())?
        }
        Value::Json(json) => serde_json::to_string(json).map_err(|e| e.to_string())?,
    })
}

fn parse_integer(input: &str) -> std::result::Result<i64, String> {
    let s = input.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Ok(i);
    }
    parse_decimal(s)?
        .trunc()
        .to_i64()
        .ok_or_else(|| format!("'{}' is not a valid integer", input))
}

fn parse_decimal(input: &str) -> std::result::Result<Decimal, String> {
    let s = input.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| format!("'{}' is not a valid number", input))
}

fn parse_float(input: &str) -> std::result::Result<f64, String> {
    input
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a valid float", input))
}

fn float_to_decimal(f: f64) -> std::result::Result<Decimal, String> {
    Decimal::from_str(&f.to_string())
        .or_else(|_| Decimal::try_from(f))
        .map_err(|_| format!("{} is not representable as a decimal", f))
}

/// ORM value for an engine value read without a logical type
fn natural_value(value: &EngineValue) -> Value {
    match value {
        EngineValue::Null => Value::Null,
        EngineValue::Number(d) => Value::Decimal(*d),
        EngineValue::BinaryDouble(f) => Value::Float(*f),
        EngineValue::Varchar(s) | EngineValue::Clob(s) => Value::String(s.clone()),
        EngineValue::Date(dt) | EngineValue::Timestamp(dt) => Value::DateTime(*dt),
        EngineValue::TimestampTz(t) => Value::TimestampTz(*t),
        EngineValue::Raw(b) | EngineValue::Blob(b) => Value::Bytes(b.clone()),
    }
}

/// Whether a date-time sits exactly on midnight
pub fn is_midnight(dt: &NaiveDateTime) -> bool {
    dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 && dt.nanosecond() == 0
}
