//! LOB write-back
//!
//! A row write stores the empty-LOB constructor in every LOB column that has content. After
//! the row write succeeds, each such column is located by primary key and its content is
//! streamed in. Null and empty values never reach this module.

use tracing::debug;

use crate::coercion::cast::value_to_text;
use crate::connection::{EngineSession, LobTarget, ResilientConnection};
use crate::error::{AdapterError, Result};
use crate::sql::binds::placeholder;
use crate::sql::sanitize::{quote_column_name, quote_table_name};
use crate::types::{ColumnDescriptor, EngineValue, Value};

/// Content of one LOB column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobData {
    Text(String),
    Binary(Vec<u8>),
}

impl LobData {
    pub fn is_binary(&self) -> bool {
        matches!(self, LobData::Binary(_))
    }

    pub fn len(&self) -> usize {
        match self {
            LobData::Text(s) => s.len(),
            LobData::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// LOB content pending for a named column
#[derive(Debug, Clone, PartialEq)]
pub struct LobColumnValue {
    pub column: String,
    pub data: LobData,
}

impl LobColumnValue {
    pub fn new(column: impl Into<String>, data: LobData) -> Self {
        Self {
            column: column.into(),
            data,
        }
    }
}

/// Content to write for `value` in a LOB column, or `None` when nothing needs writing.
///
/// Structured values are serialized first. Null, JSON null, the empty string and empty
/// byte sequences all yield `None`.
pub fn lob_payload(value: &Value, column: &ColumnDescriptor) -> Result<Option<LobData>> {
    let binary = column.base_type() == "BLOB";

    let data = match value {
        Value::Null | Value::Json(serde_json::Value::Null) => return Ok(None),
        Value::Json(json) => {
            let text = serde_json::to_string(json)?;
            if binary {
                LobData::Binary(text.into_bytes())
            } else {
                LobData::Text(text)
            }
        }
        Value::Bytes(bytes) if binary => LobData::Binary(bytes.clone()),
        Value::String(s) if binary => LobData::Binary(s.as_bytes().to_vec()),
        other if binary => {
            return Err(AdapterError::cast(
                &column.name,
                format!("cannot store {:?} in a BLOB", other),
            ));
        }
        other => LobData::Text(
            value_to_text(other).map_err(|message| AdapterError::cast(&column.name, message))?,
        ),
    };

    Ok(if data.is_empty() { None } else { Some(data) })
}

/// LOB columns of one row, addressed by the row's primary key
#[derive(Debug, Clone, PartialEq)]
pub struct LobWriteRequest {
    pub table: String,
    pub primary_key: Vec<(String, EngineValue)>,
    pub columns: Vec<LobColumnValue>,
}

impl LobWriteRequest {
    /// Build a request; `None` when there is nothing to write
    pub fn build(
        table: impl Into<String>,
        primary_key: Vec<(String, EngineValue)>,
        columns: Vec<LobColumnValue>,
    ) -> Result<Option<Self>> {
        let table = table.into();
        if columns.is_empty() {
            return Ok(None);
        }
        if primary_key.is_empty() || primary_key.iter().any(|(_, v)| v.is_null()) {
            return Err(AdapterError::validation(format!(
                "LOB write-back on '{}' needs a complete primary key",
                table
            )));
        }
        Ok(Some(Self {
            table,
            primary_key,
            columns,
        }))
    }

    /// `pk = value AND ...` as shown in errors
    pub fn key_description(&self) -> String {
        self.primary_key
            .iter()
            .map(|(name, value)| {
                format!(
                    "{} = {}",
                    name,
                    value.to_text().unwrap_or_else(|| "NULL".to_string())
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Locate and write statements for every pending column
    pub fn targets(&self) -> Vec<(LobTarget, &LobData)> {
        let table = quote_table_name(&self.table);
        let key_values: Vec<EngineValue> =
            self.primary_key.iter().map(|(_, v)| v.clone()).collect();
        let key_predicate = |first_bind: usize| {
            self.primary_key
                .iter()
                .enumerate()
                .map(|(i, (name, _))| {
                    format!("{} = {}", quote_column_name(name), placeholder(first_bind + i))
                })
                .collect::<Vec<_>>()
                .join(" AND ")
        };

        self.columns
            .iter()
            .map(|lob| {
                let column = quote_column_name(&lob.column);
                let target = LobTarget {
                    table: self.table.clone(),
                    column: lob.column.clone(),
                    locate_sql: format!(
                        "SELECT {} FROM {} WHERE {} FOR UPDATE",
                        column,
                        table,
                        key_predicate(1)
                    ),
                    write_sql: format!(
                        "UPDATE {} SET {} = {} WHERE {}",
                        table,
                        column,
                        placeholder(1),
                        key_predicate(2)
                    ),
                    key_binds: key_values.clone(),
                };
                (target, &lob.data)
            })
            .collect()
    }
}

/// Stream every pending LOB of `request` into its row.
///
/// Must run in the same transaction as the row write. Fails with
/// [`AdapterError::LobRowVanished`] when a locate step finds no row.
pub async fn write_lobs<S: EngineSession>(
    conn: &mut ResilientConnection<S>,
    request: &LobWriteRequest,
) -> Result<usize> {
    let mut written = 0;
    for (target, data) in request.targets() {
        let located = conn.write_lob(&target, data).await?;
        if located == 0 {
            return Err(AdapterError::LobRowVanished {
                table: request.table.clone(),
                key: request.key_description(),
            });
        }
        debug!(
            table = %request.table,
            column = %target.column,
            bytes = data.len(),
            "LOB written"
        );
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn clob() -> ColumnDescriptor {
        ColumnDescriptor::new("body", "CLOB")
    }

    fn blob() -> ColumnDescriptor {
        ColumnDescriptor::new("photo", "BLOB")
    }

    #[test]
    fn test_payload_skips_null_and_empty() {
        assert_eq!(lob_payload(&Value::Null, &clob()).unwrap(), None);
        assert_eq!(lob_payload(&Value::from(""), &clob()).unwrap(), None);
        assert_eq!(lob_payload(&Value::Json(json!(null)), &clob()).unwrap(), None);
        assert_eq!(lob_payload(&Value::Bytes(vec![]), &blob()).unwrap(), None);
    }

    #[test]
    fn test_payload_serializes_structured_values() {
        let payload = lob_payload(&Value::Json(json!({"a": [1, 2]})), &clob()).unwrap();
        assert_eq!(payload, Some(LobData::Text(r#"{"a":[1,2]}"#.to_string())));
    }

    #[test]
    fn test_payload_binary_choice_follows_raw_type() {
        assert_eq!(
            lob_payload(&Value::Bytes(vec![1, 2]), &blob()).unwrap(),
            Some(LobData::Binary(vec![1, 2]))
        );
        assert_eq!(
            lob_payload(&Value::from("abc"), &blob()).unwrap(),
            Some(LobData::Binary(b"abc".to_vec()))
        );
        assert!(lob_payload(&Value::Integer(1), &blob()).is_err());
        assert_eq!(
            lob_payload(&Value::Integer(1), &clob()).unwrap(),
            Some(LobData::Text("1".into()))
        );
    }

    #[test]
    fn test_request_without_columns_is_none() {
        let request = LobWriteRequest::build(
            "posts",
            vec![("id".into(), EngineValue::Number(Decimal::from(1)))],
            vec![],
        )
        .unwrap();
        assert!(request.is_none());
    }

    #[test]
    fn test_request_requires_key() {
        let err = LobWriteRequest::build(
            "posts",
            vec![],
            vec![LobColumnValue::new("body", LobData::Text("x".into()))],
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::Validation(_)));
    }

    #[test]
    fn test_targets_render_locate_and_write() {
        let request = LobWriteRequest::build(
            "posts",
            vec![
                ("tenant".into(), EngineValue::Varchar("acme".into())),
                ("id".into(), EngineValue::Number(Decimal::from(5))),
            ],
            vec![LobColumnValue::new("body", LobData::Text("hello".into()))],
        )
        .unwrap()
        .unwrap();

        let targets = request.targets();
        assert_eq!(targets.len(), 1);
        let (target, data) = &targets[0];
        assert_eq!(
            target.locate_sql,
            "SELECT body FROM posts WHERE tenant = :a1 AND id = :a2 FOR UPDATE"
        );
        assert_eq!(
            target.write_sql,
            "UPDATE posts SET body = :a1 WHERE tenant = :a2 AND id = :a3"
        );
        assert_eq!(target.key_binds.len(), 2);
        assert_eq!(**data, LobData::Text("hello".into()));
        assert_eq!(request.key_description(), "tenant = acme AND id = 5");
    }
}
