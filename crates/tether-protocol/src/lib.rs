//! Wire protocol shared by the tether client and the `tetherd` service.
//!
//! A client sends exactly one newline-terminated [`Request`] per invocation.
//! The service answers with a stream of [`RelayMessage`] values serialised
//! back to back with no delimiter: zero or more `emit-stdout`/`emit-stderr`
//! events carrying output produced while the operation ran, followed by one
//! `terminate` directive carrying the exit code.
//!
//! ```json
//! {"operation":"set-thing","arguments":["hello"],"environment":{"HOME":"/root"}}
//! ```
//!
//! ```json
//! {"operation":"emit-stdout","arguments":["variable thing is now \"hello\"\n"]}{"operation":"terminate","arguments":[0]}
//! ```
//!
//! Both sides resolve incoming messages through a [`Registry`] that maps an
//! operation name to a handler taking positional arguments.

mod codec;
mod error;
mod message;
mod registry;

pub use codec::{
    Concatenated, MAX_REQUEST_BYTES, MessageBuffer, decode_concatenated, read_request_line,
    write_relay, write_request,
};
pub use error::{OperationError, ProtocolError};
pub use message::{EMIT_STDERR, EMIT_STDOUT, EmitTarget, RelayMessage, Request, TERMINATE};
pub use registry::{Flow, Handler, Invocation, Registry, Signature};

#[cfg(test)]
mod tests;
