//! Error types for the client runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use tether_protocol::{OperationError, ProtocolError};

use crate::CLIENT_NAME;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("Argument required")]
    MissingOperation,
    #[error("failed to resolve service address {endpoint}: {source}")]
    Resolve { endpoint: String, source: io::Error },
    #[error("failed to connect to service at {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },
    #[error("[{CLIENT_NAME}]: Couldn't connect after {attempts} attempts")]
    ConnectionUnavailable { attempts: u32 },
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    #[error("failed to send request to service: {0}")]
    SendRequest(ProtocolError),
    #[error("failed to read from service: {0}")]
    ReadResponse(io::Error),
    #[error("failed to write local output: {0}")]
    ForwardOutput(io::Error),
    #[error("Error {name} not in valid entry points")]
    UnknownRelay { name: String },
    #[error("{0}")]
    RelayFailed(OperationError),
    #[error("daemon closed the connection without sending an exit status")]
    MissingExit,
}

impl AppError {
    /// Whether the failure means nothing is listening at the endpoint yet.
    pub(crate) fn is_not_listening(&self) -> bool {
        match self {
            Self::Connect { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::NotFound
                    | io::ErrorKind::AddrNotAvailable
            ),
            _ => false,
        }
    }
}
