//! Connection resilience
//!
//! [`ResilientConnection`] wraps one [`EngineSession`] with a small state machine. A lost
//! connection moves it to [`ConnectionState::Stale`]. When the retry policy allows it and no
//! transaction is open, the session is reset and the failed operation is attempted exactly
//! once more. Any other failure is reported unchanged.

use tracing::{debug, info, warn};

use crate::config::{AdapterConfig, Backend, RetryPolicy};
use crate::connection::session::{EngineSession, LobTarget, PreparedInfo, QueryResult};
use crate::connection::signatures::is_lost_connection;
use crate::error::{AdapterError, Result, SessionError};
use crate::lob::LobData;
use crate::sql::quoting::{DATE_FORMAT_MASK, TIMESTAMP_FORMAT_MASK, TIMESTAMP_TZ_FORMAT_MASK};
use crate::sql::sanitize::string_literal;
use crate::types::EngineValue;

/// Lifecycle of the wrapped session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Active,
    /// A lost-connection failure was observed; the handle must be reset before reuse
    Stale,
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Label for log lines
    pub name: Option<String>,
    /// Overrides the connection's retry policy for this call
    pub retry: Option<RetryPolicy>,
}

impl ExecOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            retry: None,
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// `ALTER SESSION` statements replayed after every (re)connect
pub fn session_settings_sql(config: &AdapterConfig) -> Result<Vec<String>> {
    let mut statements = vec![
        alter_session("NLS_DATE_FORMAT", &string_literal(DATE_FORMAT_MASK)),
        alter_session("NLS_TIMESTAMP_FORMAT", &string_literal(TIMESTAMP_FORMAT_MASK)),
        alter_session(
            "NLS_TIMESTAMP_TZ_FORMAT",
            &string_literal(TIMESTAMP_TZ_FORMAT_MASK),
        ),
        alter_session("NLS_NUMERIC_CHARACTERS", &string_literal(".,")),
    ];
    if let Some(time_zone) = &config.time_zone {
        statements.push(alter_session("TIME_ZONE", &string_literal(time_zone)));
    }
    for (name, value) in &config.session_settings {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AdapterError::configuration(format!(
                "Invalid session setting name '{}'",
                name
            )));
        }
        statements.push(alter_session(name, &setting_value(value)));
    }
    Ok(statements)
}

/// Keywords and numbers pass through; anything else becomes a string literal
fn setting_value(value: &str) -> String {
    let is_token = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'));
    if is_token {
        value.to_string()
    } else {
        string_literal(value)
    }
}

fn alter_session(name: &str, value: &str) -> String {
    format!("ALTER SESSION SET {} = {}", name.to_uppercase(), value)
}

enum Operation<'a> {
    Execute {
        sql: &'a str,
        binds: &'a [EngineValue],
    },
    Query {
        sql: &'a str,
        binds: &'a [EngineValue],
    },
    Prepare {
        sql: &'a str,
    },
    WriteLob {
        target: &'a LobTarget,
        data: &'a LobData,
    },
}

impl Operation<'_> {
    fn sql(&self) -> &str {
        match self {
            Operation::Execute { sql, .. }
            | Operation::Query { sql, .. }
            | Operation::Prepare { sql } => *sql,
            Operation::WriteLob { target, .. } => target.locate_sql.as_str(),
        }
    }
}

enum Outcome {
    Affected(u64),
    Rows(QueryResult),
    Prepared(PreparedInfo),
}

/// Session wrapper with lost-connection recovery
pub struct ResilientConnection<S: EngineSession> {
    session: S,
    state: ConnectionState,
    policy: RetryPolicy,
    settings: Vec<String>,
    in_transaction: bool,
    resets: u64,
}

impl<S: EngineSession> ResilientConnection<S> {
    pub fn new(session: S, config: &AdapterConfig) -> Result<Self> {
        Ok(Self {
            session,
            state: ConnectionState::Disconnected,
            policy: config.retry,
            settings: session_settings_sql(config)?,
            in_transaction: false,
            resets: 0,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn backend(&self) -> Backend {
        self.session.backend()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Number of resets performed since creation
    pub fn reset_count(&self) -> u64 {
        self.resets
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Open the session and replay session settings
    pub async fn connect(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        if let Err(err) = self.session.open().await {
            let err = self.classify(err, "connect");
            self.state = ConnectionState::Disconnected;
            return Err(err);
        }
        if let Err(err) = self.replay_settings().await {
            self.state = ConnectionState::Stale;
            return Err(err);
        }
        self.state = ConnectionState::Active;
        info!(backend = self.backend().name(), "Connected");
        Ok(())
    }

    /// Whether the engine answers a round trip
    pub async fn ping(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        match self.session.ping().await {
            Ok(()) => true,
            Err(err) => {
                if is_lost_connection(self.backend(), &err) {
                    self.state = ConnectionState::Stale;
                }
                debug!(error = %err, "Ping failed");
                false
            }
        }
    }

    /// Replace the physical connection. Any open transaction is lost.
    pub async fn reset(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        self.in_transaction = false;
        self.resets += 1;
        if let Err(err) = self.session.reset().await {
            self.state = ConnectionState::Stale;
            return Err(AdapterError::ConnectionLost(format!("reconnect failed: {}", err)));
        }
        if let Err(err) = self.replay_settings().await {
            self.state = ConnectionState::Stale;
            return Err(err);
        }
        self.state = ConnectionState::Active;
        info!(resets = self.resets, "Connection reset");
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        let result = self
            .session
            .close()
            .await
            .map_err(|err| self.classify(err, "disconnect"));
        self.state = ConnectionState::Disconnected;
        self.in_transaction = false;
        result
    }

    pub async fn execute(
        &mut self,
        sql: &str,
        binds: &[EngineValue],
        opts: &ExecOptions,
    ) -> Result<u64> {
        match self.run(Operation::Execute { sql, binds }, opts).await? {
            Outcome::Affected(n) => Ok(n),
            _ => Ok(0),
        }
    }

    pub async fn query(
        &mut self,
        sql: &str,
        binds: &[EngineValue],
        opts: &ExecOptions,
    ) -> Result<QueryResult> {
        match self.run(Operation::Query { sql, binds }, opts).await? {
            Outcome::Rows(rows) => Ok(rows),
            _ => Ok(QueryResult::default()),
        }
    }

    pub async fn prepare(&mut self, sql: &str, opts: &ExecOptions) -> Result<PreparedInfo> {
        match self.run(Operation::Prepare { sql }, opts).await? {
            Outcome::Prepared(info) => Ok(info),
            _ => Err(AdapterError::validation(format!(
                "Prepare returned no statement information: {}",
                sql
            ))),
        }
    }

    /// Locate and fill one LOB. Returns the number of rows located.
    pub async fn write_lob(&mut self, target: &LobTarget, data: &LobData) -> Result<u64> {
        let opts = ExecOptions::named("lob write");
        match self.run(Operation::WriteLob { target, data }, &opts).await? {
            Outcome::Affected(n) => Ok(n),
            _ => Ok(0),
        }
    }

    pub async fn begin_transaction(&mut self) -> Result<()> {
        self.ensure_connected()?;
        if self.in_transaction {
            return Err(AdapterError::validation("A transaction is already open"));
        }
        self.session
            .set_autocommit(false)
            .await
            .map_err(|err| self.classify(err, "begin transaction"))?;
        self.in_transaction = true;
        debug!("Transaction started");
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let result = self.session.commit().await;
        self.end_transaction().await;
        result.map_err(|err| self.classify(err, "COMMIT"))
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let result = self.session.rollback().await;
        self.end_transaction().await;
        result.map_err(|err| self.classify(err, "ROLLBACK"))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn end_transaction(&mut self) {
        self.in_transaction = false;
        if let Err(err) = self.session.set_autocommit(true).await {
            warn!(error = %err, "Failed to restore autocommit");
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state {
            ConnectionState::Disconnected => Err(AdapterError::NotConnected),
            _ => Ok(()),
        }
    }

    async fn replay_settings(&mut self) -> Result<()> {
        for sql in &self.settings {
            if let Err(err) = self.session.execute(sql, &[]).await {
                return Err(if is_lost_connection(self.session.backend(), &err) {
                    AdapterError::ConnectionLost(err.to_string())
                } else {
                    AdapterError::engine(err, sql.clone())
                });
            }
        }
        Ok(())
    }

    /// Map a session failure, marking the connection stale when it was lost
    fn classify(&mut self, err: SessionError, sql: &str) -> AdapterError {
        if is_lost_connection(self.backend(), &err) {
            self.state = ConnectionState::Stale;
            AdapterError::ConnectionLost(err.to_string())
        } else {
            AdapterError::engine(err, sql)
        }
    }

    async fn dispatch(&mut self, op: &Operation<'_>) -> std::result::Result<Outcome, SessionError> {
        match op {
            Operation::Execute { sql, binds } => {
                self.session.execute(sql, binds).await.map(Outcome::Affected)
            }
            Operation::Query { sql, binds } => self.session.query(sql, binds).await.map(Outcome::Rows),
            Operation::Prepare { sql } => self.session.prepare(sql).await.map(Outcome::Prepared),
            Operation::WriteLob { target, data } => self
                .session
                .write_lob(target, data)
                .await
                .map(Outcome::Affected),
        }
    }

    async fn run(&mut self, op: Operation<'_>, opts: &ExecOptions) -> Result<Outcome> {
        self.ensure_connected()?;
        let name = opts.name.as_deref().unwrap_or("SQL");
        let policy = opts.retry.unwrap_or(self.policy);
        debug!(name, sql = op.sql(), "Executing");

        // A stale handle is only usable again after a reset, which counts as this call's retry
        if self.state == ConnectionState::Stale {
            if !policy.auto_retry || self.in_transaction {
                return Err(AdapterError::ConnectionLost(
                    "connection is stale; reconnect before reuse".to_string(),
                ));
            }
            warn!(name, "Connection stale, resetting before use");
            self.reset().await?;
            return self
                .dispatch(&op)
                .await
                .map_err(|err| self.classify(err, op.sql()));
        }

        let err = match self.dispatch(&op).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        if !is_lost_connection(self.backend(), &err) {
            return Err(AdapterError::engine(err, op.sql()));
        }

        self.state = ConnectionState::Stale;
        if !policy.auto_retry || self.in_transaction {
            warn!(name, error = %err, "Connection lost");
            return Err(AdapterError::ConnectionLost(err.to_string()));
        }

        warn!(name, error = %err, "Connection lost, resetting and retrying once");
        if let Err(reset_err) = self.reset().await {
            return Err(AdapterError::ConnectionLost(format!(
                "{}; {}",
                err, reset_err
            )));
        }

        self.dispatch(&op)
            .await
            .map_err(|err| self.classify(err, op.sql()))
    }
}
