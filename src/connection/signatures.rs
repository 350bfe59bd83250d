//! Lost-connection classification
//!
//! Whether a failure means the physical connection is gone is decided from tables of error
//! codes and message fragments per backend. These tables track driver wording and need
//! updating whenever a driver changes the text it reports.

use crate::config::Backend;
use crate::error::SessionError;

/// Engine error codes reported when the server side of the session is gone
pub const LOST_CONNECTION_CODES: &[&str] = &[
    "ORA-00028", // session killed
    "ORA-01012", // not logged on
    "ORA-02396", // maximum idle time exceeded
    "ORA-03113", // end-of-file on communication channel
    "ORA-03114", // not connected
    "ORA-03135", // connection lost contact
    "ORA-12170", // connect timeout
    "ORA-12537", // connection closed
    "ORA-12541", // no listener
    "ORA-12571", // packet writer failure
];

/// Client library errors for a handle that is no longer usable
const OCI_LOST_CONNECTION_MARKERS: &[&str] = &[
    "DPI-1010", // not connected
    "DPI-1080", // connection was closed
    "Closed Connection",
    "Io exception",
    "Socket closed",
];

/// SQLSTATE class 08 codes that mean the link itself failed
const ODBC_LOST_CONNECTION_STATES: &[&str] = &["08S01", "08003", "08007"];

const ODBC_LOST_CONNECTION_MARKERS: &[&str] = &[
    "Communication link failure",
    "Connection not open",
    "Closed Connection",
    "Socket closed",
];

/// Whether `err` from a `backend` session means the connection was lost
pub fn is_lost_connection(backend: Backend, err: &SessionError) -> bool {
    if err
        .code
        .as_deref()
        .is_some_and(|c| LOST_CONNECTION_CODES.contains(&c))
        || LOST_CONNECTION_CODES.iter().any(|c| err.message.contains(c))
    {
        return true;
    }

    match backend {
        Backend::Oci => OCI_LOST_CONNECTION_MARKERS
            .iter()
            .any(|m| err.message.contains(m)),
        Backend::Odbc => {
            err.code
                .as_deref()
                .is_some_and(|c| ODBC_LOST_CONNECTION_STATES.contains(&c))
                || ODBC_LOST_CONNECTION_MARKERS
                    .iter()
                    .any(|m| err.message.contains(m))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_codes_are_lost_on_every_backend() {
        let err = SessionError::new("ORA-03113: end-of-file on communication channel");
        assert!(is_lost_connection(Backend::Oci, &err));
        assert!(is_lost_connection(Backend::Odbc, &err));
    }

    #[test]
    fn test_oci_client_markers() {
        assert!(is_lost_connection(
            Backend::Oci,
            &SessionError::new("DPI-1080: connection was closed by ORA-3113")
        ));
        assert!(is_lost_connection(Backend::Oci, &SessionError::new("Closed Connection")));
    }

    #[test]
    fn test_odbc_sqlstates() {
        let err = SessionError::new(
            "ODBC emitted an error calling 'SQLExecute':\nState: 08S01, Native error: 0, Message: Communication link failure",
        );
        assert!(is_lost_connection(Backend::Odbc, &err));
        assert!(is_lost_connection(
            Backend::Odbc,
            &SessionError::with_code("08003", "connection does not exist")
        ));
    }

    #[test]
    fn test_ordinary_errors_are_not_lost() {
        let err = SessionError::new("ORA-00942: table or view does not exist");
        assert!(!is_lost_connection(Backend::Oci, &err));
        assert!(!is_lost_connection(Backend::Odbc, &err));
        assert!(!is_lost_connection(
            Backend::Odbc,
            &SessionError::with_code("42000", "syntax error")
        ));
    }
}
