//! Engine connections
//!
//! Driver sessions implement [`EngineSession`]; [`ResilientConnection`] adds the
//! lost-connection state machine on top of any of them.

pub mod resilient;
pub mod session;
pub mod signatures;

#[cfg(feature = "oci")]
pub mod oci;
#[cfg(feature = "odbc")]
pub mod odbc;

pub use resilient::{ConnectionState, ExecOptions, ResilientConnection, session_settings_sql};
pub use session::{EngineSession, LobTarget, PreparedInfo, QueryResult};
pub use signatures::is_lost_connection;

use crate::config::{AdapterConfig, Backend};
use crate::error::{AdapterError, Result};

/// A driver session for the configured backend.
///
/// Fails with a configuration error when the crate was built without that backend's feature.
pub fn open_session(config: &AdapterConfig) -> Result<Box<dyn EngineSession>> {
    match config.backend {
        #[cfg(feature = "oci")]
        Backend::Oci => Ok(Box::new(oci::OciSession::new(config))),
        #[cfg(feature = "odbc")]
        Backend::Odbc => Ok(Box::new(odbc::OdbcSession::new(config))),
        #[allow(unreachable_patterns)]
        backend => Err(AdapterError::configuration(format!(
            "backend '{}' is not compiled in; enable the `{}` feature",
            backend.name(),
            backend.name()
        ))),
    }
}

/// Open a session for the configured backend and connect it
pub async fn connect(config: &AdapterConfig) -> Result<ResilientConnection<Box<dyn EngineSession>>> {
    let mut conn = ResilientConnection::new(open_session(config)?, config)?;
    conn.connect().await?;
    Ok(conn)
}
