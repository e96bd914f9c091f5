//! Shared service state and the handling of one decoded request.

use std::cell::RefCell;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use tether_protocol::{
    EmitTarget, Flow, Invocation, OperationError, Registry, RelayMessage, Request, write_relay,
};

use super::environment::replace_environment;
use super::relay::RelaySink;
use super::{DISPATCH_TARGET, EXIT_OPERATION, SHUTDOWN_NOTICE};

/// What the session should do after a request has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Wait for the next request on the same connection.
    Continue,
    /// Stop the whole service with the given process exit code.
    Shutdown(u8),
    /// The service was already stopping; nothing was dispatched.
    Refused,
}

struct Shared<S> {
    state: S,
    stopping: bool,
}

/// Operation registry plus the state its handlers share.
///
/// The state lock is held from environment replacement until the terminate
/// directive has been written, so concurrent callers are served one at a
/// time and never observe each other's environment. Once a request has
/// stopped the service, callers still queued on the lock are refused.
pub(crate) struct Service<S> {
    registry: Registry<S, String>,
    shared: Mutex<Shared<S>>,
}

impl<S> Service<S> {
    /// Creates a service around `registry` with initial `state`.
    pub(crate) fn new(registry: Registry<S, String>, state: S) -> Self {
        Self {
            registry,
            shared: Mutex::new(Shared {
                state,
                stopping: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<S>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the shared state.
    #[cfg(test)]
    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.lock().state)
    }

    /// Marks the service as stopping; later requests are refused.
    pub(crate) fn halt(&self) {
        self.lock().stopping = true;
    }

    /// Applies the request's environment, dispatches it, and answers.
    pub(crate) fn handle<W: Write>(&self, request: &Request, writer: &RefCell<W>) -> Outcome {
        let mut shared = self.lock();
        if shared.stopping {
            warn!(
                target: DISPATCH_TARGET,
                operation = %request.operation,
                "service is stopping; refusing request"
            );
            announce_shutdown(&RelaySink::new(EmitTarget::Stdout, writer));
            respond(writer, 1);
            return Outcome::Refused;
        }

        replace_environment(&request.environment);
        let outcome = self.dispatch(request, &mut shared.state, writer);
        if matches!(outcome, Outcome::Shutdown(_)) {
            shared.stopping = true;
        }
        outcome
    }

    fn dispatch<W: Write>(&self, request: &Request, state: &mut S, writer: &RefCell<W>) -> Outcome {
        let mut stdout = RelaySink::new(EmitTarget::Stdout, writer);
        let mut stderr = RelaySink::new(EmitTarget::Stderr, writer);

        if request.operation == EXIT_OPERATION {
            info!(target: DISPATCH_TARGET, "exit requested by client");
            announce_shutdown(&stdout);
            respond(writer, 0);
            return Outcome::Shutdown(0);
        }

        debug!(
            target: DISPATCH_TARGET,
            operation = %request.operation,
            arguments = request.arguments.len(),
            "dispatching operation"
        );
        let result = self.registry.dispatch(Invocation {
            operation: &request.operation,
            state,
            stdout: &mut stdout,
            stderr: &mut stderr,
            arguments: &request.arguments,
        });

        match result {
            Ok(Flow::Continue) => {
                respond(writer, 0);
                Outcome::Continue
            }
            Ok(Flow::Terminate(code)) => {
                info!(
                    target: DISPATCH_TARGET,
                    operation = %request.operation,
                    code,
                    "operation requested termination"
                );
                announce_shutdown(&stdout);
                respond(writer, code);
                Outcome::Shutdown(0)
            }
            Err(failure) => {
                report_failure(&request.operation, &failure, &stderr);
                announce_shutdown(&stdout);
                respond(writer, 1);
                Outcome::Shutdown(0)
            }
        }
    }
}

fn report_failure<W: Write>(operation: &str, failure: &OperationError, stderr: &RelaySink<'_, W>) {
    error!(
        target: DISPATCH_TARGET,
        operation = %operation,
        error = %failure,
        "operation failed"
    );
    if let Err(relay_error) = stderr.send(&failure.render_trace()) {
        warn!(
            target: DISPATCH_TARGET,
            error = %relay_error,
            "failed to relay operation failure"
        );
    }
}

fn announce_shutdown<W: Write>(stdout: &RelaySink<'_, W>) {
    if let Err(relay_error) = stdout.send(SHUTDOWN_NOTICE) {
        warn!(
            target: DISPATCH_TARGET,
            error = %relay_error,
            "failed to relay shutdown notice"
        );
    }
}

/// Sends the terminate directive that releases the waiting client.
pub(crate) fn respond<W: Write>(writer: &RefCell<W>, code: i32) {
    if let Err(relay_error) = write_relay(&mut *writer.borrow_mut(), &RelayMessage::terminate(code))
    {
        warn!(
            target: DISPATCH_TARGET,
            code,
            error = %relay_error,
            "failed to send terminate directive"
        );
    }
}
