//! INSERT and UPDATE rendering
//!
//! Scalar values are bound. LOB columns with content are written as the empty-LOB
//! constructor and reported back so the content can be streamed in afterwards.

use crate::coercion::Caster;
use crate::error::{AdapterError, Result};
use crate::lob::{LobColumnValue, LobData, lob_payload};
use crate::sql::binds::BindCollector;
use crate::sql::quoting::{EMPTY_BLOB, EMPTY_CLOB};
use crate::sql::sanitize::{quote_column_name, quote_table_name};
use crate::types::{ColumnDescriptor, EngineValue, Value};

/// A rendered row write
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub binds: Vec<EngineValue>,
    /// LOB columns that still need their content written
    pub lob_columns: Vec<LobColumnValue>,
}

/// Find the descriptor for `name`, ignoring case
pub fn find_column<'a>(columns: &'a [ColumnDescriptor], name: &str) -> Option<&'a ColumnDescriptor> {
    columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

fn require_column<'a>(
    table: &str,
    columns: &'a [ColumnDescriptor],
    name: &str,
) -> Result<&'a ColumnDescriptor> {
    find_column(columns, name).ok_or_else(|| {
        AdapterError::validation(format!("Unknown column '{}' for table '{}'", name, table))
    })
}

/// SQL for one assigned value, collecting binds and LOB work
fn assignment(
    column: &ColumnDescriptor,
    value: &Value,
    caster: &Caster,
    binds: &mut BindCollector,
    lob_columns: &mut Vec<LobColumnValue>,
) -> Result<String> {
    if column.is_lob() {
        return Ok(match lob_payload(value, column)? {
            Some(data) => {
                let constructor = match data {
                    LobData::Binary(_) => EMPTY_BLOB,
                    LobData::Text(_) => EMPTY_CLOB,
                };
                lob_columns.push(LobColumnValue::new(&column.name, data));
                constructor.to_string()
            }
            None => "NULL".to_string(),
        });
    }
    Ok(binds.push(caster.cast_in(value, column)?))
}

/// Render `INSERT INTO table (...) VALUES (...)`. Virtual columns are skipped.
pub fn render_insert(
    table: &str,
    columns: &[ColumnDescriptor],
    values: &[(String, Value)],
    caster: &Caster,
) -> Result<RenderedStatement> {
    let mut binds = BindCollector::new();
    let mut lob_columns = Vec::new();
    let mut names = Vec::new();
    let mut placeholders = Vec::new();

    for (name, value) in values {
        let column = require_column(table, columns, name)?;
        if column.virtual_column {
            continue;
        }
        names.push(quote_column_name(&column.name));
        placeholders.push(assignment(column, value, caster, &mut binds, &mut lob_columns)?);
    }

    if names.is_empty() {
        return Err(AdapterError::validation(format!(
            "Insert into '{}' has no writable columns",
            table
        )));
    }

    Ok(RenderedStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_table_name(table),
            names.join(", "),
            placeholders.join(", ")
        ),
        binds: binds.into_values(),
        lob_columns,
    })
}

/// Render `UPDATE table SET ... WHERE key = ...`. Virtual columns are skipped.
///
/// A LOB column assigned a null or empty value is set to NULL.
pub fn render_update(
    table: &str,
    columns: &[ColumnDescriptor],
    values: &[(String, Value)],
    key: &[(String, Value)],
    caster: &Caster,
) -> Result<RenderedStatement> {
    if key.is_empty() {
        return Err(AdapterError::validation(format!(
            "Update of '{}' needs a key",
            table
        )));
    }

    let mut binds = BindCollector::new();
    let mut lob_columns = Vec::new();
    let mut sets = Vec::new();

    for (name, value) in values {
        let column = require_column(table, columns, name)?;
        if column.virtual_column {
            continue;
        }
        let rhs = assignment(column, value, caster, &mut binds, &mut lob_columns)?;
        sets.push(format!("{} = {}", quote_column_name(&column.name), rhs));
    }

    if sets.is_empty() {
        return Err(AdapterError::validation(format!(
            "Update of '{}' has no writable columns",
            table
        )));
    }

    let mut predicates = Vec::with_capacity(key.len());
    for (name, value) in key {
        let column = require_column(table, columns, name)?;
        let placeholder = binds.push(caster.cast_in(value, column)?);
        predicates.push(format!("{} = {}", quote_column_name(&column.name), placeholder));
    }

    Ok(RenderedStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            quote_table_name(table),
            sets.join(", "),
            predicates.join(" AND ")
        ),
        binds: binds.into_values(),
        lob_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;
    use rust_decimal::Decimal;

    fn columns() -> Vec<ColumnDescriptor> {
        let mut columns = vec![
            ColumnDescriptor::new("id", "NUMBER(38,0)"),
            ColumnDescriptor::new("title", "VARCHAR2(200)"),
            ColumnDescriptor::new("body", "CLOB"),
            ColumnDescriptor::new("cover", "BLOB"),
            ColumnDescriptor::new("title_len", "NUMBER").virtual_column(),
        ];
        let types = [
            LogicalType::Integer,
            LogicalType::String,
            LogicalType::Clob,
            LogicalType::Blob,
            LogicalType::Decimal,
        ];
        for (column, logical) in columns.iter_mut().zip(types) {
            column.logical_type = logical;
        }
        columns
    }

    #[test]
    fn test_render_insert_binds_scalars_and_defers_lobs() {
        let stmt = render_insert(
            "posts",
            &columns(),
            &[
                ("id".into(), Value::Integer(7)),
                ("title".into(), Value::from("Hello")),
                ("body".into(), Value::from("long text")),
                ("cover".into(), Value::Null),
                ("title_len".into(), Value::Integer(5)),
            ],
            &Caster::default(),
        )
        .unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO posts (id, title, body, cover) VALUES (:a1, :a2, empty_clob(), NULL)"
        );
        assert_eq!(
            stmt.binds,
            vec![
                EngineValue::Number(Decimal::from(7)),
                EngineValue::Varchar("Hello".into())
            ]
        );
        assert_eq!(stmt.lob_columns.len(), 1);
        assert_eq!(stmt.lob_columns[0].column, "body");
    }

    #[test]
    fn test_render_insert_empty_lob_short_circuits() {
        let stmt = render_insert(
            "posts",
            &columns(),
            &[
                ("id".into(), Value::Integer(1)),
                ("body".into(), Value::from("")),
                ("cover".into(), Value::Bytes(Vec::new())),
            ],
            &Caster::default(),
        )
        .unwrap();
        assert!(stmt.lob_columns.is_empty());
        assert!(stmt.sql.ends_with("VALUES (:a1, NULL, NULL)"));
    }

    #[test]
    fn test_render_update() {
        let stmt = render_update(
            "posts",
            &columns(),
            &[
                ("title".into(), Value::from("New")),
                ("cover".into(), Value::Bytes(vec![9, 9])),
            ],
            &[("id".into(), Value::Integer(3))],
            &Caster::default(),
        )
        .unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE posts SET title = :a1, cover = empty_blob() WHERE id = :a2"
        );
        assert_eq!(stmt.binds.len(), 2);
        assert!(stmt.lob_columns[0].data.is_binary());
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let err = render_insert(
            "posts",
            &columns(),
            &[("nope".into(), Value::Integer(1))],
            &Caster::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_update_requires_key() {
        assert!(
            render_update(
                "posts",
                &columns(),
                &[("title".into(), Value::from("x"))],
                &[],
                &Caster::default()
            )
            .is_err()
        );
    }
}
