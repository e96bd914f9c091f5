//! Request and relay message types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client operation that prints its argument on standard output.
pub const EMIT_STDOUT: &str = "emit-stdout";
/// Client operation that prints its argument on standard error.
pub const EMIT_STDERR: &str = "emit-stderr";
/// Client operation that ends the client with the carried exit code.
pub const TERMINATE: &str = "terminate";

/// Request sent once per connection by the client.
///
/// `environment` is the caller's complete environment, not a diff: the
/// service replaces its own environment with it before dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Name of the operation to invoke.
    pub operation: String,
    /// Positional arguments forwarded verbatim from the command line.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Snapshot of the caller's environment.
    pub environment: BTreeMap<String, String>,
}

impl Request {
    /// Builds a request from its parts.
    #[must_use]
    pub fn new(
        operation: impl Into<String>,
        arguments: Vec<String>,
        environment: BTreeMap<String, String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            arguments,
            environment,
        }
    }
}

/// Output stream targeted by an emit relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    /// The caller's standard output.
    Stdout,
    /// The caller's standard error.
    Stderr,
}

impl EmitTarget {
    /// Client operation name that handles this stream.
    #[must_use]
    pub const fn operation(self) -> &'static str {
        match self {
            Self::Stdout => EMIT_STDOUT,
            Self::Stderr => EMIT_STDERR,
        }
    }
}

/// Event relayed from the service to the client.
///
/// The same envelope carries output chunks and the terminate directive, so
/// the client resolves both through its registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Client operation to invoke.
    pub operation: String,
    /// Positional arguments for the client operation.
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl RelayMessage {
    /// Builds an output event for the given stream.
    #[must_use]
    pub fn emit(target: EmitTarget, text: impl Into<String>) -> Self {
        Self {
            operation: target.operation().to_owned(),
            arguments: vec![Value::String(text.into())],
        }
    }

    /// Builds the terminate directive carrying `code`.
    #[must_use]
    pub fn terminate(code: i32) -> Self {
        Self {
            operation: TERMINATE.to_owned(),
            arguments: vec![Value::from(code)],
        }
    }

    /// Returns `true` when this message is the terminate directive.
    #[must_use]
    pub fn is_terminate(&self) -> bool {
        self.operation == TERMINATE
    }
}
