//! OCI session through the `oracle` crate
//!
//! Calls into the client library block, so each one runs on the blocking pool. Autocommit
//! is tracked here: in autocommit mode every statement is followed by a commit.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use oracle::sql_type::{Blob, Clob, OracleType, ToSql};
use oracle::{Connection, SqlValue};
use rust_decimal::Decimal;
use tracing::info;

use crate::config::{AdapterConfig, Backend};
use crate::connection::session::{EngineSession, LobTarget, PreparedInfo, QueryResult};
use crate::error::SessionError;
use crate::lob::LobData;
use crate::types::EngineValue;

impl From<oracle::Error> for SessionError {
    fn from(err: oracle::Error) -> Self {
        SessionError::new(err.to_string())
    }
}

/// Session over the OCI client library
pub struct OciSession {
    username: String,
    password: String,
    connect_string: String,
    conn: Option<Arc<Connection>>,
    autocommit: bool,
}

impl OciSession {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            connect_string: config.connect_string.clone(),
            conn: None,
            autocommit: true,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&Connection) -> Result<T, SessionError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .conn
            .clone()
            .ok_or_else(|| SessionError::new("DPI-1010: not connected"))?;
        tokio::task::spawn_blocking(move || f(conn.as_ref()))
            .await
            .map_err(|e| SessionError::new(format!("blocking task failed: {}", e)))?
    }
}

fn bind_value(value: &EngineValue) -> Box<dyn ToSql + Send> {
    match value {
        EngineValue::Null => Box::new(Option::<String>::None),
        EngineValue::Number(d) => Box::new(d.to_string()),
        EngineValue::BinaryDouble(f) => Box::new(*f),
        EngineValue::Varchar(s) | EngineValue::Clob(s) => Box::new(s.clone()),
        EngineValue::Date(dt) | EngineValue::Timestamp(dt) => Box::new(*dt),
        EngineValue::TimestampTz(t) => Box::new(*t),
        EngineValue::Raw(b) | EngineValue::Blob(b) => Box::new(b.clone()),
    }
}

fn bind_values(binds: &[EngineValue]) -> Vec<Box<dyn ToSql + Send>> {
    binds.iter().map(bind_value).collect()
}

fn as_params(values: &[Box<dyn ToSql + Send>]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v.as_ref() as &dyn ToSql).collect()
}

fn engine_value(value: &SqlValue) -> Result<EngineValue, SessionError> {
    if value.is_null()? {
        return Ok(EngineValue::Null);
    }
    Ok(match value.oracle_type()? {
        OracleType::Number(_, _) | OracleType::Float(_) | OracleType::Int64 | OracleType::UInt64 => {
            let text: String = value.get()?;
            let number = Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|e| SessionError::new(format!("unreadable NUMBER '{}': {}", text, e)))?;
            EngineValue::Number(number)
        }
        OracleType::BinaryFloat | OracleType::BinaryDouble => EngineValue::BinaryDouble(value.get()?),
        OracleType::Date => EngineValue::Date(value.get::<NaiveDateTime>()?),
        OracleType::Timestamp(_) => EngineValue::Timestamp(value.get::<NaiveDateTime>()?),
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => {
            EngineValue::TimestampTz(value.get::<DateTime<FixedOffset>>()?)
        }
        OracleType::Raw(_) | OracleType::LongRaw => EngineValue::Raw(value.get()?),
        OracleType::BLOB => EngineValue::Blob(value.get()?),
        OracleType::CLOB | OracleType::NCLOB => EngineValue::Clob(value.get()?),
        _ => EngineValue::Varchar(value.get()?),
    })
}

fn run_query(conn: &Connection, sql: &str, binds: &[EngineValue]) -> Result<QueryResult, SessionError> {
    let values = bind_values(binds);
    let rows = conn.query(sql, &as_params(&values))?;
    let mut result = QueryResult::default();
    result.columns = rows
        .column_info()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    for row in rows {
        let row = row?;
        let values = row
            .sql_values()
            .iter()
            .map(engine_value)
            .collect::<Result<Vec<_>, _>>()?;
        result.rows.push(values);
    }
    Ok(result)
}

#[async_trait]
impl EngineSession for OciSession {
    fn backend(&self) -> Backend {
        Backend::Oci
    }

    async fn open(&mut self) -> Result<(), SessionError> {
        let (username, password, connect_string) = (
            self.username.clone(),
            self.password.clone(),
            self.connect_string.clone(),
        );
        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(&username, &password, &connect_string)
        })
        .await
        .map_err(|e| SessionError::new(format!("blocking task failed: {}", e)))??;
        self.conn = Some(Arc::new(conn));
        self.autocommit = true;
        info!(connect_string = %self.connect_string, "OCI connection opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.conn.is_none() {
            return Ok(());
        }
        let result = self.blocking(|conn| conn.close().map_err(SessionError::from)).await;
        self.conn = None;
        result
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.blocking(|conn| {
            conn.query_row("SELECT 1 FROM dual", &[])?;
            Ok(())
        })
        .await
    }

    async fn execute(&mut self, sql: &str, binds: &[EngineValue]) -> Result<u64, SessionError> {
        let sql = sql.to_string();
        let binds = binds.to_vec();
        let autocommit = self.autocommit;
        self.blocking(move |conn| {
            let values = bind_values(&binds);
            let stmt = conn.execute(&sql, &as_params(&values))?;
            let affected = stmt.row_count()?;
            if autocommit {
                conn.commit()?;
            }
            Ok(affected)
        })
        .await
    }

    async fn query(
        &mut self,
        sql: &str,
        binds: &[EngineValue],
    ) -> Result<QueryResult, SessionError> {
        let sql = sql.to_string();
        let binds = binds.to_vec();
        self.blocking(move |conn| run_query(conn, &sql, &binds)).await
    }

    async fn prepare(&mut self, sql: &str) -> Result<PreparedInfo, SessionError> {
        let sql = sql.to_string();
        self.blocking(move |conn| {
            let stmt = conn.statement(&sql).build()?;
            Ok(PreparedInfo {
                bind_count: stmt.bind_count(),
                is_query: stmt.is_query(),
                sql,
            })
        })
        .await
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.autocommit = enabled;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        self.blocking(|conn| conn.commit().map_err(SessionError::from)).await
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        self.blocking(|conn| conn.rollback().map_err(SessionError::from))
            .await
    }

    async fn write_lob(
        &mut self,
        target: &LobTarget,
        data: &LobData,
    ) -> Result<u64, SessionError> {
        let target = target.clone();
        let data = data.clone();
        let autocommit = self.autocommit;
        self.blocking(move |conn| {
            let values = bind_values(&target.key_binds);
            let rows = conn.query(&target.locate_sql, &as_params(&values))?;
            let mut located = 0;
            for row in rows {
                let row = row?;
                let written = match &data {
                    LobData::Text(text) => {
                        let mut lob: Clob = row.get(0)?;
                        lob.write_all(text.as_bytes())
                    }
                    LobData::Binary(bytes) => {
                        let mut lob: Blob = row.get(0)?;
                        lob.write_all(bytes)
                    }
                };
                written.map_err(|e| {
                    SessionError::new(format!("writing {}.{} failed: {}", target.table, target.column, e))
                })?;
                located += 1;
            }
            if autocommit {
                conn.commit()?;
            }
            Ok(located)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_not_connected() {
        let config = AdapterConfig::builder("//localhost:1521/FREEPDB1")
            .credentials("app", "secret")
            .build();
        let session = OciSession::new(&config);
        assert!(session.conn.is_none());
        assert!(session.autocommit);
        assert_eq!(session.backend(), Backend::Oci);
    }
}
