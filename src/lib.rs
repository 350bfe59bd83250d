//! # runtara-oracle-compat
//!
//! An Oracle compatibility layer for generic relational persistence frameworks.
//!
//! The engine differs from what most ORM layers assume in a handful of places: short
//! identifier limits, no native boolean, `DATE` columns that carry a time of day, no
//! `LIMIT`/`OFFSET` on older releases, a 1000-entry cap on `IN` lists, and large objects
//! that are written through a locator rather than bound inline. This crate smooths over
//! those differences.
//!
//! ## Features
//!
//! - **Identifier Shortening**: Deterministic abbreviation, falling back to a fixed letter followed by a hex digest, for names over the engine limit
//! - **Type Coercion**: Logical types resolved from raw types, per-table overrides and name heuristics
//! - **Dialect Translation**: Quoting, literals, ROWNUM pagination, DISTINCT rewriting, chunked IN lists and DDL
//! - **Connection Resilience**: Lost-connection detection with a single reset-and-retry outside transactions
//! - **LOB Write-Back**: CLOB/BLOB content streamed into the row after it is written, in the same transaction
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use runtara_oracle_compat::{AdapterConfig, OracleAdapter, TypeOverrideTable, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AdapterConfig::builder("//localhost:1521/FREEPDB1")
//!         .credentials("app", "secret")
//!         .build();
//!     let mut adapter = OracleAdapter::connect(config, TypeOverrideTable::new()).await?;
//!
//!     adapter
//!         .insert_row(
//!             "posts",
//!             &[
//!                 ("id".to_string(), Value::Integer(1)),
//!                 ("title".to_string(), Value::from("Hello")),
//!                 ("body".to_string(), Value::from("A very long body...")),
//!             ],
//!         )
//!         .await?;
//!
//!     let page = adapter
//!         .select_page("SELECT id, title FROM posts ORDER BY id", &[], Some(10), Some(0))
//!         .await?;
//!     println!("{} rows", page.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use runtara_oracle_compat::{AdapterConfig, Backend};
//!
//! let config = AdapterConfig::builder("DSN=orcl")
//!     .backend(Backend::Odbc)
//!     .emulate_booleans(true)              // NUMBER(1) columns are booleans (default)
//!     .emulate_booleans_from_strings(true) // CHAR(1) and *_flag columns are Y/N booleans
//!     .max_identifier_length(30)           // Pre-12.2 identifier limit
//!     .auto_retry(true)                    // Reset and retry once on a lost connection
//!     .build();
//! ```
//!
//! ## Backends
//!
//! Engine drivers are behind features: `oci` uses the `oracle` crate and `odbc` uses
//! `odbc-api`. Without either, the adapter can still be driven by any
//! [`EngineSession`] implementation.

pub mod adapter;
pub mod coercion;
pub mod config;
pub mod connection;
pub mod error;
pub mod identifier;
pub mod lob;
pub mod sql;
pub mod types;

// Re-export main types for convenience
pub use adapter::{OracleAdapter, Row};
pub use coercion::{Caster, TypeOverrideTable, TypeResolver, parse_boolean};
pub use config::{
    AdapterConfig, AdapterConfigBuilder, Backend, EmulationFlags, FormatMasks, RetryPolicy,
};
pub use connection::{
    ConnectionState, EngineSession, ExecOptions, QueryResult, ResilientConnection,
};
pub use error::{AdapterError, Result, SessionError};
pub use identifier::{IdentifierBudgets, IdentifierKind, shorten};
pub use lob::{LobData, LobWriteRequest};
pub use types::{ColumnDefinition, ColumnDescriptor, EngineValue, LogicalType, Value};

// Re-export SQL utilities for advanced users
pub use sql::ddl::DdlGenerator;
pub use sql::sanitize::{quote_identifier, validate_identifier};
