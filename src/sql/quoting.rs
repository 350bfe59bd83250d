//! Value literals
//!
//! Temporal literals always carry an explicit format mask so rendering never depends on the
//! session's NLS settings.

use crate::coercion::Caster;
use crate::error::Result;
use crate::lob::{LobData, lob_payload};
use crate::sql::sanitize::string_literal;
use crate::types::{ColumnDescriptor, EngineValue, Value, hex_upper};

pub const DATE_FORMAT_MASK: &str = "YYYY-MM-DD HH24:MI:SS";
pub const TIMESTAMP_FORMAT_MASK: &str = "YYYY-MM-DD HH24:MI:SS.FF6";
pub const TIMESTAMP_TZ_FORMAT_MASK: &str = "YYYY-MM-DD HH24:MI:SS.FF6 TZH:TZM";

pub const EMPTY_CLOB: &str = "empty_clob()";
pub const EMPTY_BLOB: &str = "empty_blob()";

/// Render an engine value as a SQL literal
pub fn quote_literal(value: &EngineValue) -> String {
    match value {
        EngineValue::Null => "NULL".to_string(),
        EngineValue::Number(d) => d.to_string(),
        EngineValue::BinaryDouble(f) if f.is_nan() => "BINARY_DOUBLE_NAN".to_string(),
        EngineValue::BinaryDouble(f) if f.is_infinite() => {
            if *f > 0.0 {
                "BINARY_DOUBLE_INFINITY".to_string()
            } else {
                "-BINARY_DOUBLE_INFINITY".to_string()
            }
        }
        EngineValue::BinaryDouble(f) => format!("{:?}", f),
        EngineValue::Varchar(s) | EngineValue::Clob(s) => string_literal(s),
        EngineValue::Date(dt) => format!(
            "TO_DATE('{}','{}')",
            dt.format("%Y-%m-%d %H:%M:%S"),
            DATE_FORMAT_MASK
        ),
        EngineValue::Timestamp(dt) => format!(
            "TO_TIMESTAMP('{}','{}')",
            dt.format("%Y-%m-%d %H:%M:%S%.6f"),
            TIMESTAMP_FORMAT_MASK
        ),
        EngineValue::TimestampTz(t) => format!(
            "TO_TIMESTAMP_TZ('{}','{}')",
            t.format("%Y-%m-%d %H:%M:%S%.6f %:z"),
            TIMESTAMP_TZ_FORMAT_MASK
        ),
        EngineValue::Raw(b) | EngineValue::Blob(b) => format!("HEXTORAW('{}')", hex_upper(b)),
    }
}

/// Render an ORM value as a literal for `column`.
///
/// LOB columns with a non-empty value render as the empty-LOB constructor; the content is
/// written afterwards by LOB write-back. Empty or null LOB values render as `NULL`.
pub fn quote_value(value: &Value, column: &ColumnDescriptor, caster: &Caster) -> Result<String> {
    if column.is_lob() {
        return Ok(match lob_payload(value, column)? {
            Some(LobData::Binary(_)) => EMPTY_BLOB.to_string(),
            Some(LobData::Text(_)) => EMPTY_CLOB.to_string(),
            None => "NULL".to_string(),
        });
    }
    Ok(quote_literal(&caster.cast_in(value, column)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    fn column(name: &str, sql_type: &str, logical: LogicalType) -> ColumnDescriptor {
        let mut column = ColumnDescriptor::new(name, sql_type);
        column.logical_type = logical;
        column
    }

    #[test]
    fn test_quote_literal_scalars() {
        assert_eq!(quote_literal(&EngineValue::Null), "NULL");
        assert_eq!(quote_literal(&EngineValue::Number(Decimal::new(1050, 2))), "10.50");
        assert_eq!(quote_literal(&EngineValue::BinaryDouble(2.0)), "2.0");
        assert_eq!(quote_literal(&EngineValue::BinaryDouble(f64::NAN)), "BINARY_DOUBLE_NAN");
        assert_eq!(quote_literal(&EngineValue::Varchar("O'Neil".into())), "'O''Neil'");
        assert_eq!(quote_literal(&EngineValue::Raw(vec![0x0a, 0xff])), "HEXTORAW('0AFF')");
    }

    #[test]
    fn test_quote_literal_temporals_carry_masks() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_micro_opt(7, 8, 9, 123456)
            .unwrap();
        assert_eq!(
            quote_literal(&EngineValue::Date(dt)),
            "TO_DATE('2024-05-06 07:08:09','YYYY-MM-DD HH24:MI:SS')"
        );
        assert_eq!(
            quote_literal(&EngineValue::Timestamp(dt)),
            "TO_TIMESTAMP('2024-05-06 07:08:09.123456','YYYY-MM-DD HH24:MI:SS.FF6')"
        );

        let tz = FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
            .unwrap();
        assert_eq!(
            quote_literal(&EngineValue::TimestampTz(tz)),
            "TO_TIMESTAMP_TZ('2024-05-06 07:08:09.000000 +05:30','YYYY-MM-DD HH24:MI:SS.FF6 TZH:TZM')"
        );
    }

    #[test]
    fn test_quote_value_lob_placeholders() {
        let caster = Caster::default();
        let body = column("body", "CLOB", LogicalType::Clob);
        let photo = column("photo", "BLOB", LogicalType::Blob);

        assert_eq!(quote_value(&Value::from("text"), &body, &caster).unwrap(), "empty_clob()");
        assert_eq!(quote_value(&Value::from(""), &body, &caster).unwrap(), "NULL");
        assert_eq!(quote_value(&Value::Null, &body, &caster).unwrap(), "NULL");
        assert_eq!(
            quote_value(&Value::Bytes(vec![1]), &photo, &caster).unwrap(),
            "empty_blob()"
        );
    }

    #[test]
    fn test_quote_value_casts_first() {
        let caster = Caster::default();
        let active = column("active", "NUMBER(1)", LogicalType::Boolean);
        let hired = column("hired", "DATE", LogicalType::Date);

        assert_eq!(quote_value(&Value::from("yes"), &active, &caster).unwrap(), "1");
        assert_eq!(
            quote_value(&Value::Date(NaiveDate::from_ymd_opt(2001, 9, 9).unwrap()), &hired, &caster)
                .unwrap(),
            "TO_DATE('2001-09-09 00:00:00','YYYY-MM-DD HH24:MI:SS')"
        );
    }
}
