//! Configuration for the compatibility layer
//!
//! Provides a builder pattern for configuring the adapter. The configuration is
//! constructed once at startup and passed explicitly to every component that
//! needs it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifier::{DEFAULT_IDENTIFIER_BUDGET, IdentifierBudgets};

/// Default ceiling on the number of expressions in one IN list
pub const DEFAULT_IN_LIST_LIMIT: usize = 1000;

/// Native driver binding used to reach the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OCI client library
    #[default]
    Oci,
    /// ODBC driver manager
    Odbc,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Oci => "oci",
            Backend::Odbc => "odbc",
        }
    }
}

/// Name- and width-based heuristics that infer richer logical types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulationFlags {
    /// `NUMBER(1)` columns are booleans stored as `1`/`0`
    pub booleans_as_numeric: bool,
    /// One-character and `*_flag`/`*_yn` character columns are booleans stored as `Y`/`N`
    pub booleans_from_strings: bool,
    /// `DATE` columns whose name contains a `date` token are pure dates
    pub dates_by_column_name: bool,
    /// Unscaled `NUMBER` columns named `id` or `*_id` are integers
    pub integers_by_column_name: bool,
}

impl Default for EmulationFlags {
    fn default() -> Self {
        Self {
            booleans_as_numeric: true,
            booleans_from_strings: false,
            dates_by_column_name: false,
            integers_by_column_name: false,
        }
    }
}

/// chrono format strings for parsing user-entered dates and times.
///
/// When unset, ISO-8601 forms are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatMasks {
    pub string_to_date: Option<String>,
    pub string_to_time: Option<String>,
}

/// Reconnect behaviour for a lost connection.
///
/// At most one reset-and-retry happens per logical operation, whatever the flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub auto_retry: bool,
}

impl RetryPolicy {
    pub fn enabled() -> Self {
        Self { auto_retry: true }
    }

    pub fn disabled() -> Self {
        Self { auto_retry: false }
    }
}

/// Configuration for the adapter
#[derive(Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Driver binding to use
    #[serde(default)]
    pub backend: Backend,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    /// TNS alias, EZConnect string or ODBC connection string
    pub connect_string: String,
    #[serde(default)]
    pub emulation: EmulationFlags,
    #[serde(default)]
    pub formats: FormatMasks,
    #[serde(default)]
    pub identifier_budgets: IdentifierBudgets,
    /// Maximum number of expressions the engine accepts in one IN list
    #[serde(default = "default_in_list_limit")]
    pub in_list_limit: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Session time zone, replayed on every connect
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Extra `ALTER SESSION SET name = value` settings, replayed on every connect.
    /// Values other than plain keywords and numbers are sent as string literals.
    #[serde(default)]
    pub session_settings: Vec<(String, String)>,
}

fn default_in_list_limit() -> usize {
    DEFAULT_IN_LIST_LIMIT
}

impl AdapterConfig {
    /// Create a new configuration builder
    pub fn builder(connect_string: impl Into<String>) -> AdapterConfigBuilder {
        AdapterConfigBuilder::new(connect_string)
    }
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("backend", &self.backend)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_string", &self.connect_string)
            .field("emulation", &self.emulation)
            .field("formats", &self.formats)
            .field("identifier_budgets", &self.identifier_budgets)
            .field("in_list_limit", &self.in_list_limit)
            .field("retry", &self.retry)
            .field("time_zone", &self.time_zone)
            .field("session_settings", &self.session_settings)
            .finish()
    }
}

/// Builder for AdapterConfig
#[derive(Debug)]
pub struct AdapterConfigBuilder {
    config: AdapterConfig,
}

impl AdapterConfigBuilder {
    /// Create a new builder with the connect string
    pub fn new(connect_string: impl Into<String>) -> Self {
        Self {
            config: AdapterConfig {
                backend: Backend::default(),
                username: String::new(),
                password: String::new(),
                connect_string: connect_string.into(),
                emulation: EmulationFlags::default(),
                formats: FormatMasks::default(),
                identifier_budgets: IdentifierBudgets::default(),
                in_list_limit: DEFAULT_IN_LIST_LIMIT,
                retry: RetryPolicy::default(),
                time_zone: None,
                session_settings: Vec::new(),
            },
        }
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// Treat `NUMBER(1)` columns as booleans (default: true)
    pub fn emulate_booleans(mut self, enabled: bool) -> Self {
        self.config.emulation.booleans_as_numeric = enabled;
        self
    }

    /// Treat one-character and flag-named character columns as booleans (default: false)
    pub fn emulate_booleans_from_strings(mut self, enabled: bool) -> Self {
        self.config.emulation.booleans_from_strings = enabled;
        self
    }

    /// Treat `DATE` columns with a date-like name as pure dates (default: false)
    pub fn emulate_dates_by_column_name(mut self, enabled: bool) -> Self {
        self.config.emulation.dates_by_column_name = enabled;
        self
    }

    /// Treat unscaled numbers with an id-like name as integers (default: false)
    pub fn emulate_integers_by_column_name(mut self, enabled: bool) -> Self {
        self.config.emulation.integers_by_column_name = enabled;
        self
    }

    pub fn string_to_date_format(mut self, format: impl Into<String>) -> Self {
        self.config.formats.string_to_date = Some(format.into());
        self
    }

    pub fn string_to_time_format(mut self, format: impl Into<String>) -> Self {
        self.config.formats.string_to_time = Some(format.into());
        self
    }

    /// Set every identifier budget to the same byte length (default: 30)
    pub fn max_identifier_length(mut self, length: usize) -> Self {
        self.config.identifier_budgets = IdentifierBudgets::uniform(length);
        self
    }

    pub fn identifier_budgets(mut self, budgets: IdentifierBudgets) -> Self {
        self.config.identifier_budgets = budgets;
        self
    }

    /// Set the IN-list expression ceiling (default: 1000)
    pub fn in_list_limit(mut self, limit: usize) -> Self {
        self.config.in_list_limit = limit;
        self
    }

    /// Reconnect and retry once when the connection is lost (default: false)
    pub fn auto_retry(mut self, enabled: bool) -> Self {
        self.config.retry.auto_retry = enabled;
        self
    }

    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.config.time_zone = Some(time_zone.into());
        self
    }

    pub fn session_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .session_settings
            .push((name.into(), value.into()));
        self
    }

    /// Build the configuration
    pub fn build(self) -> AdapterConfig {
        self.config
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfigBuilder::new("").build()
    }
}

impl AdapterConfig {
    /// Largest identifier budget any kind may use with the classic engine limit
    pub fn uses_classic_identifier_limit(&self) -> bool {
        self.identifier_budgets.max() <= DEFAULT_IDENTIFIER_BUDGET
    }
}
