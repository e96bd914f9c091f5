//! Request dispatch for accepted connections.
//!
//! A session reads newline-terminated requests, replaces the process
//! environment with the caller's, runs the named operation with its output
//! relayed live, and answers with a terminate directive. Normal completion
//! keeps the connection open for the next request; every other outcome stops
//! the whole service.

mod environment;
mod relay;
mod service;
mod session;

pub(crate) use service::Service;
pub(crate) use session::SessionHandler;
#[cfg(test)]
pub(crate) use session::{SessionEnd, run_session};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Request operation that stops the service without touching the registry.
pub const EXIT_OPERATION: &str = "exit";

/// Relayed to the client whenever the service is about to stop.
pub const SHUTDOWN_NOTICE: &str = concat!("Shutting down ", env!("CARGO_PKG_NAME"), "\n");
