//! Error types for the Oracle compatibility layer

use std::fmt;

use thiserror::Error;

use crate::identifier::IdentifierKind;

/// Errors surfaced by the compatibility layer
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A caller-supplied name does not fit its kind's budget
    #[error("{kind} name '{name}' is {len} bytes long, exceeding the {budget} byte limit", len = .name.len())]
    IdentifierTooLong {
        kind: IdentifierKind,
        name: String,
        budget: usize,
    },

    /// Even the digest form of a generated name cannot fit the budget
    #[error("cannot shorten '{candidate}' to {budget} bytes: budget is below the minimum digest size")]
    UnresolvableDigest { candidate: String, budget: usize },

    /// The locate step of LOB write-back found no row
    #[error("LOB write-back failed: no row in {table} matching {key}")]
    LobRowVanished { table: String, key: String },

    /// Injection-relevant input that could not be coerced to its primitive type
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot cast value for column '{column}': {message}")]
    Cast { column: String, message: String },

    /// The connection was lost and could not be recovered within the retry budget
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Not connected")]
    NotConnected,

    /// Any engine error that is not a lost connection
    #[error("Engine error{}: {message}\n  SQL: {sql}", code_suffix(.code))]
    Engine {
        code: Option<String>,
        message: String,
        sql: String,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdapterError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn cast(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cast {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn engine(err: SessionError, sql: impl Into<String>) -> Self {
        Self::Engine {
            code: err.code,
            message: err.message,
            sql: sql.into(),
        }
    }

    /// Whether this error is the connectivity failure of the retry protocol
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" {}", c)).unwrap_or_default()
}

/// Raw failure reported by an engine session.
///
/// Drivers flatten their own error types into this shape so that connection-lost
/// classification works the same way for every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    /// Engine error code (`ORA-03113`) or SQLSTATE (`08S01`), when one could be extracted
    pub code: Option<String>,
    pub message: String,
}

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: extract_error_code(&message),
            message,
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) if !self.message.contains(code.as_str()) => {
                write!(f, "{}: {}", code, self.message)
            }
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SessionError {}

/// Pull an `ORA-NNNNN` code, or failing that an ODBC `State: XXXXX`, out of a driver message
fn extract_error_code(message: &str) -> Option<String> {
    if let Some(pos) = message.find("ORA-") {
        let digits: String = message[pos + 4..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return Some(format!("ORA-{}", digits));
        }
    }
    if let Some(pos) = message.find("State: ") {
        let state: String = message[pos + 7..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if state.len() == 5 {
            return Some(state);
        }
    }
    None
}

pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_extracts_ora_code() {
        let err = SessionError::new("ORA-03113: end-of-file on communication channel");
        assert_eq!(err.code.as_deref(), Some("ORA-03113"));
    }

    #[test]
    fn test_session_error_extracts_sqlstate() {
        let err = SessionError::new("State: 08S01, Native error: 0, Message: link failure");
        assert_eq!(err.code.as_deref(), Some("08S01"));
    }

    #[test]
    fn test_session_error_without_code() {
        let err = SessionError::new("Closed Connection");
        assert!(err.code.is_none());
        assert_eq!(err.to_string(), "Closed Connection");
    }

    #[test]
    fn test_session_error_display_prefixes_missing_code() {
        let err = SessionError::with_code("08003", "connection not open");
        assert_eq!(err.to_string(), "08003: connection not open");
    }

    #[test]
    fn test_engine_error_keeps_sql() {
        let err = AdapterError::engine(
            SessionError::new("ORA-00942: table or view does not exist"),
            "SELECT * FROM missing",
        );
        let text = err.to_string();
        assert!(text.contains("ORA-00942"));
        assert!(text.contains("SELECT * FROM missing"));
        assert!(!err.is_connection_lost());
    }

    #[test]
    fn test_identifier_too_long_message() {
        let err = AdapterError::IdentifierTooLong {
            kind: IdentifierKind::Table,
            name: "a".repeat(31),
            budget: 30,
        };
        assert!(err.to_string().contains("31 bytes"));
        assert!(err.to_string().contains("table"));
    }
}
