//! Per-connection request loop.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use tracing::{debug, error, warn};

use tether_protocol::{EmitTarget, ProtocolError, Request, decode_concatenated, read_request_line};

use crate::process::{ShutdownReason, ShutdownTrigger};
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::relay::RelaySink;
use super::service::{Outcome, Service, respond};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The client closed the connection; the service keeps running.
    Closed,
    /// The whole service must stop with the given process exit code.
    Shutdown(u8),
    /// The service was already stopping and turned the request away.
    Refused,
}

/// Serves requests from `reader` until the peer closes or the service must stop.
///
/// Each line may hold one or more concatenated request objects; they are
/// handled in order. A line that does not decode is fatal: the failure is
/// relayed on stderr, the client is told to exit with 1, and the service
/// stops with exit code 1. Requests that arrive after another session has
/// stopped the service are answered with terminate(1) and not dispatched.
pub(crate) fn run_session<S, R, W>(service: &Service<S>, reader: &mut R, writer: W) -> SessionEnd
where
    R: BufRead,
    W: Write,
{
    let writer = RefCell::new(writer);
    loop {
        let line = match read_request_line(reader) {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(target: DISPATCH_TARGET, "client closed connection");
                return SessionEnd::Closed;
            }
            Err(ProtocolError::Io(source)) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %source,
                    "failed to read request"
                );
                return SessionEnd::Closed;
            }
            Err(failure) => return reject(service, &failure, &writer),
        };

        for request in decode_concatenated::<Request>(&line) {
            let request = match request {
                Ok(request) => request,
                Err(failure) => return reject(service, &failure, &writer),
            };
            match service.handle(&request, &writer) {
                Outcome::Continue => {}
                Outcome::Shutdown(code) => return SessionEnd::Shutdown(code),
                Outcome::Refused => return SessionEnd::Refused,
            }
        }
    }
}

fn reject<S, W: Write>(
    service: &Service<S>,
    failure: &ProtocolError,
    writer: &RefCell<W>,
) -> SessionEnd {
    service.halt();
    error!(
        target: DISPATCH_TARGET,
        error = %failure,
        "malformed request; stopping service"
    );
    let sink = RelaySink::new(EmitTarget::Stderr, writer);
    if let Err(relay_error) = sink.send(&format!("error: {failure}\n")) {
        warn!(
            target: DISPATCH_TARGET,
            error = %relay_error,
            "failed to relay decode failure"
        );
    }
    respond(writer, 1);
    SessionEnd::Shutdown(1)
}

/// Connection handler that runs a session per accepted connection.
pub(crate) struct SessionHandler<S> {
    service: Arc<Service<S>>,
    shutdown: ShutdownTrigger,
}

impl<S> SessionHandler<S> {
    pub(crate) const fn new(service: Arc<Service<S>>, shutdown: ShutdownTrigger) -> Self {
        Self { service, shutdown }
    }
}

impl<S: Send + 'static> ConnectionHandler for SessionHandler<S> {
    fn handle(&self, stream: ConnectionStream) {
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(clone_error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %clone_error,
                    "failed to split connection"
                );
                return;
            }
        };
        let mut reader = BufReader::new(stream);
        if let SessionEnd::Shutdown(exit_code) = run_session(&self.service, &mut reader, writer) {
            if let Err(close_error) = reader.get_ref().close() {
                debug!(
                    target: DISPATCH_TARGET,
                    error = %close_error,
                    "failed to close connection"
                );
            }
            self.shutdown
                .request(ShutdownReason::Requested { exit_code });
        }
    }
}
