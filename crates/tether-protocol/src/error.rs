//! Error types for message coding and operation dispatch.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Errors raised while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A buffer did not contain a valid JSON value at the decode offset.
    #[error("failed to decode message at byte {offset}: {source}")]
    Decode {
        /// Byte offset at which decoding started.
        offset: usize,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A message could not be serialised.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// A request line exceeded the size limit.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Bytes read so far.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
    /// Reading from or writing to the transport failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Builds a decode error for a parser failure at `offset`.
    #[must_use]
    pub const fn decode(offset: usize, source: serde_json::Error) -> Self {
        Self::Decode { offset, source }
    }

    /// Returns `true` when the parser ran out of input mid-value.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Decode { source, .. } if source.is_eof())
    }
}

/// Errors raised while looking up or running an operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The requested name is not in the registry.
    #[error(
        "\"{name}\" is not a registered operation.\n\n\
         Register operations with `Registry::register` before the service \
         starts accepting connections.\n\n\
         Currently registered operations are:\n{catalogue}"
    )]
    UnknownOperation {
        /// Name that was requested.
        name: String,
        /// One line per registered operation with its signature.
        catalogue: String,
    },
    /// The argument count does not match the declared signature.
    #[error("{name}{signature} takes {expected} but {given} were given")]
    Arity {
        /// Operation name.
        name: String,
        /// Rendered signature, for example `(value)`.
        signature: String,
        /// Human description of the accepted argument count.
        expected: String,
        /// Number of arguments supplied.
        given: usize,
    },
    /// A name reserved for built-in handling was registered.
    #[error("\"{name}\" is reserved and cannot be registered")]
    Reserved {
        /// The reserved name.
        name: String,
    },
    /// An argument had the wrong shape for the operation.
    #[error("invalid argument for {operation}: {message}")]
    InvalidArgument {
        /// Operation name.
        operation: String,
        /// Description of the problem.
        message: String,
    },
    /// The handler reported a failure.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// The handler panicked.
    #[error("operation {name} panicked: {message}")]
    Panicked {
        /// Operation name.
        name: String,
        /// Panic payload rendered as text.
        message: String,
    },
    /// Writing the operation's output failed.
    #[error("failed to write operation output")]
    Output(#[from] io::Error),
}

impl OperationError {
    /// Builds a handler failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a handler failure wrapping an underlying error.
    #[must_use]
    pub fn caused_by(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds an invalid argument error.
    #[must_use]
    pub fn invalid_argument(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Renders the error and its full `source()` chain for relaying.
    #[must_use]
    pub fn render_trace(&self) -> String {
        let mut trace = format!("error: {self}\n");
        let mut cause = self.source();
        while let Some(error) = cause {
            trace.push_str(&format!("  caused by: {error}\n"));
            cause = error.source();
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_trace_walks_source_chain() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "no such variable");
        let error = OperationError::caused_by("lookup failed", inner);
        let trace = error.render_trace();
        assert_eq!(
            trace,
            "error: lookup failed\n  caused by: no such variable\n"
        );
    }

    #[test]
    fn output_failure_names_its_cause_once() {
        let error = OperationError::from(io::Error::new(io::ErrorKind::BrokenPipe, "peer hung up"));
        assert_eq!(
            error.render_trace(),
            "error: failed to write operation output\n  caused by: peer hung up\n"
        );
    }

    #[test]
    fn incomplete_detects_eof() {
        let source = serde_json::from_slice::<serde_json::Value>(br#"{"operation":"#)
            .expect_err("truncated json");
        assert!(ProtocolError::decode(0, source).is_incomplete());
    }

    #[test]
    fn syntax_error_is_not_incomplete() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{]").expect_err("bad json");
        assert!(!ProtocolError::decode(0, source).is_incomplete());
    }
}
