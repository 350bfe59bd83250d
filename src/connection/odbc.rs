//! ODBC session
//!
//! ODBC handles are tied to the thread that uses them, so each session owns a worker thread
//! holding the environment and the connection. Requests travel over a channel and answers
//! come back on a oneshot. The driver runs in text mode: every value is bound and fetched as
//! text and typed by the caster on the way out.

use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use odbc_api::buffers::TextRowSet;
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox};
use odbc_api::{Connection, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::{AdapterConfig, Backend};
use crate::connection::session::{EngineSession, LobTarget, PreparedInfo, QueryResult};
use crate::error::SessionError;
use crate::lob::LobData;
use crate::sql::binds::to_question_marks;
use crate::types::EngineValue;

/// Rows fetched per round trip
const FETCH_BATCH_SIZE: usize = 256;

/// Longest text value fetched; longer LOB values are truncated
const MAX_TEXT_LENGTH: usize = 1024 * 1024;

enum Request {
    Open,
    Close,
    Ping,
    Execute { sql: String, binds: Vec<EngineValue> },
    Query { sql: String, binds: Vec<EngineValue> },
    Prepare { sql: String },
    SetAutocommit(bool),
    Commit,
    Rollback,
    WriteLob { target: LobTarget, data: LobData },
}

enum Response {
    Done,
    Affected(u64),
    Rows(QueryResult),
    Prepared(PreparedInfo),
}

struct Job {
    request: Request,
    reply: oneshot::Sender<Result<Response, SessionError>>,
}

/// Session over an ODBC driver manager
pub struct OdbcSession {
    jobs: mpsc::Sender<Job>,
}

impl OdbcSession {
    pub fn new(config: &AdapterConfig) -> Self {
        let connection_string = connection_string(config);
        let (jobs, receiver) = mpsc::channel::<Job>();
        thread::spawn(move || run_worker(connection_string, receiver));
        Self { jobs }
    }

    async fn call(&self, request: Request) -> Result<Response, SessionError> {
        let (reply, answer) = oneshot::channel();
        self.jobs
            .send(Job { request, reply })
            .map_err(|_| SessionError::new("Closed Connection: ODBC worker has stopped"))?;
        answer
            .await
            .map_err(|_| SessionError::new("Closed Connection: ODBC worker dropped the request"))?
    }
}

/// Append credentials to the configured connection string when they are not already in it
fn connection_string(config: &AdapterConfig) -> String {
    let mut out = config.connect_string.trim_end_matches(';').to_string();
    let upper = out.to_uppercase();
    if !config.username.is_empty() && !upper.contains("UID=") {
        out.push_str(&format!(";UID={}", config.username));
    }
    if !config.password.is_empty() && !upper.contains("PWD=") {
        out.push_str(&format!(";PWD={}", config.password));
    }
    out.push(';');
    out
}

fn odbc_error(err: odbc_api::Error) -> SessionError {
    SessionError::new(err.to_string())
}

fn not_connected() -> SessionError {
    SessionError::with_code("08003", "Connection not open")
}

fn run_worker(connection_string: String, jobs: mpsc::Receiver<Job>) {
    let env = match Environment::new() {
        Ok(env) => env,
        Err(err) => {
            let err = odbc_error(err);
            for job in jobs {
                let _ = job.reply.send(Err(err.clone()));
            }
            return;
        }
    };

    let mut conn: Option<Connection<'_>> = None;
    for job in jobs {
        let result = handle(&env, &connection_string, &mut conn, job.request);
        let _ = job.reply.send(result);
    }
    debug!("ODBC worker stopped");
}

fn handle<'env>(
    env: &'env Environment,
    connection_string: &str,
    conn: &mut Option<Connection<'env>>,
    request: Request,
) -> Result<Response, SessionError> {
    if let Request::Open = request {
        *conn = Some(
            env.connect_with_connection_string(connection_string, ConnectionOptions::default())
                .map_err(odbc_error)?,
        );
        info!("ODBC connection opened");
        return Ok(Response::Done);
    }
    if let Request::Close = request {
        *conn = None;
        return Ok(Response::Done);
    }

    let connection = conn.as_ref().ok_or_else(not_connected)?;
    match request {
        Request::Open | Request::Close => Ok(Response::Done),
        Request::Ping => query(connection, "SELECT 1 FROM dual", &[]).map(|_| Response::Done),
        Request::Execute { sql, binds } => execute(connection, &sql, &binds).map(Response::Affected),
        Request::Query { sql, binds } => query(connection, &sql, &binds).map(Response::Rows),
        Request::Prepare { sql } => prepare(connection, sql).map(Response::Prepared),
        Request::SetAutocommit(enabled) => connection
            .set_autocommit(enabled)
            .map(|_| Response::Done)
            .map_err(odbc_error),
        Request::Commit => connection.commit().map(|_| Response::Done).map_err(odbc_error),
        Request::Rollback => connection
            .rollback()
            .map(|_| Response::Done)
            .map_err(odbc_error),
        Request::WriteLob { target, data } => write_lob(connection, &target, data),
    }
}

/// Parameters in positional order for `sql` rewritten to `?` markers
fn parameters(
    order: &[usize],
    binds: &[EngineValue],
) -> Result<Vec<Box<dyn InputParameter>>, SessionError> {
    order
        .iter()
        .map(|&index| {
            let value = binds.get(index - 1).ok_or_else(|| {
                SessionError::new(format!("ORA-01008: not all variables bound (:a{})", index))
            })?;
            Ok(parameter(value.clone()))
        })
        .collect()
}

fn parameter(value: EngineValue) -> Box<dyn InputParameter> {
    match value {
        EngineValue::Null => Box::new(VarCharBox::null()),
        EngineValue::Raw(bytes) | EngineValue::Blob(bytes) => Box::new(VarBinaryBox::from_vec(bytes)),
        other => Box::new(VarCharBox::from_string(other.to_text().unwrap_or_default())),
    }
}

fn execute(conn: &Connection<'_>, sql: &str, binds: &[EngineValue]) -> Result<u64, SessionError> {
    let (sql, order) = to_question_marks(sql);
    let params = parameters(&order, binds)?;
    let mut prepared = conn.prepare(&sql).map_err(odbc_error)?;
    prepared.execute(params.as_slice()).map_err(odbc_error)?;
    let affected = prepared.row_count().map_err(odbc_error)?;
    Ok(affected.unwrap_or(0) as u64)
}

fn query(conn: &Connection<'_>, sql: &str, binds: &[EngineValue]) -> Result<QueryResult, SessionError> {
    let (sql, order) = to_question_marks(sql);
    let params = parameters(&order, binds)?;
    let mut prepared = conn.prepare(&sql).map_err(odbc_error)?;
    let mut result = QueryResult::default();

    let Some(mut cursor) = prepared.execute(params.as_slice()).map_err(odbc_error)? else {
        return Ok(result);
    };

    let num_cols = cursor.num_result_cols().map_err(odbc_error)?;
    for index in 1..=num_cols {
        result
            .columns
            .push(cursor.col_name(index as u16).map_err(odbc_error)?);
    }
    if num_cols == 0 {
        return Ok(result);
    }

    let mut buffers = TextRowSet::for_cursor(FETCH_BATCH_SIZE, &mut cursor, Some(MAX_TEXT_LENGTH))
        .map_err(odbc_error)?;
    let mut row_cursor = cursor.bind_buffer(&mut buffers).map_err(odbc_error)?;
    while let Some(batch) = row_cursor.fetch().map_err(odbc_error)? {
        for row in 0..batch.num_rows() {
            let values = (0..batch.num_cols())
                .map(|col| match batch.at(col, row) {
                    Some(bytes) => EngineValue::Varchar(String::from_utf8_lossy(bytes).into_owned()),
                    None => EngineValue::Null,
                })
                .collect();
            result.rows.push(values);
        }
    }
    Ok(result)
}

fn prepare(conn: &Connection<'_>, sql: String) -> Result<PreparedInfo, SessionError> {
    let (marked, order) = to_question_marks(&sql);
    let mut prepared = conn.prepare(&marked).map_err(odbc_error)?;
    let num_cols = prepared.num_result_cols().map_err(odbc_error)?;
    Ok(PreparedInfo {
        sql,
        bind_count: order.len(),
        is_query: num_cols > 0,
    })
}

/// Text mode has no locator API: the locate query counts the row and the content is
/// assigned with a plain UPDATE.
fn write_lob(conn: &Connection<'_>, target: &LobTarget, data: LobData) -> Result<Response, SessionError> {
    let located = query(conn, &target.locate_sql, &target.key_binds)?.len() as u64;
    if located == 0 {
        return Ok(Response::Affected(0));
    }

    let content = match data {
        LobData::Text(text) => EngineValue::Clob(text),
        LobData::Binary(bytes) => EngineValue::Blob(bytes),
    };
    let mut binds = Vec::with_capacity(target.key_binds.len() + 1);
    binds.push(content);
    binds.extend(target.key_binds.iter().cloned());
    execute(conn, &target.write_sql, &binds)?;
    Ok(Response::Affected(located))
}

fn unexpected(response: Response) -> SessionError {
    let kind = match response {
        Response::Done => "done",
        Response::Affected(_) => "row count",
        Response::Rows(_) => "rows",
        Response::Prepared(_) => "statement information",
    };
    SessionError::new(format!("unexpected ODBC worker response: {}", kind))
}

#[async_trait]
impl EngineSession for OdbcSession {
    fn backend(&self) -> Backend {
        Backend::Odbc
    }

    async fn open(&mut self) -> Result<(), SessionError> {
        self.call(Request::Open).await.map(|_| ())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.call(Request::Close).await.map(|_| ())
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.call(Request::Ping).await.map(|_| ())
    }

    async fn execute(&mut self, sql: &str, binds: &[EngineValue]) -> Result<u64, SessionError> {
        match self
            .call(Request::Execute {
                sql: sql.to_string(),
                binds: binds.to_vec(),
            })
            .await?
        {
            Response::Affected(n) => Ok(n),
            other => Err(unexpected(other)),
        }
    }

    async fn query(
        &mut self,
        sql: &str,
        binds: &[EngineValue],
    ) -> Result<QueryResult, SessionError> {
        match self
            .call(Request::Query {
                sql: sql.to_string(),
                binds: binds.to_vec(),
            })
            .await?
        {
            Response::Rows(rows) => Ok(rows),
            other => Err(unexpected(other)),
        }
    }

    async fn prepare(&mut self, sql: &str) -> Result<PreparedInfo, SessionError> {
        match self.call(Request::Prepare { sql: sql.to_string() }).await? {
            Response::Prepared(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.call(Request::SetAutocommit(enabled)).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        self.call(Request::Commit).await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        self.call(Request::Rollback).await.map(|_| ())
    }

    async fn write_lob(
        &mut self,
        target: &LobTarget,
        data: &LobData,
    ) -> Result<u64, SessionError> {
        match self
            .call(Request::WriteLob {
                target: target.clone(),
                data: data.clone(),
            })
            .await?
        {
            Response::Affected(n) => Ok(n),
            other => Err(unexpected(other)),
        }
    }
}
