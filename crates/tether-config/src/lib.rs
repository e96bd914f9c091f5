//! Shared configuration for the tether client and the `tetherd` service.
//!
//! Both binaries must agree on where the service socket lives, so the
//! endpoint, the logging knobs, and their defaults are defined once here and
//! layered by `ortho_config`: built-in defaults, then a TOML file supplied via
//! `--config-path`, then `TETHER_*` environment variables, then command-line
//! flags.

mod defaults;
mod logging;
mod socket;

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT, default_log_filter, default_log_filter_string,
    default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by the client and the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TETHER")]
pub struct Config {
    /// Socket the service listens on and the client connects to.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter expression applied by the service.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for the service's structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the file and environment layers only.
    ///
    /// Used by the service, which refuses command-line arguments.
    pub fn load_without_cli() -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter([std::ffi::OsString::from(env!("CARGO_PKG_NAME"))])
    }

    /// Socket endpoint for the service.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
