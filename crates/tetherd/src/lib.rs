//! The tether service.
//!
//! `tetherd` keeps operations and their state resident in one long-lived
//! process. Each client connection carries a request naming an operation,
//! its arguments, and the caller's complete environment. The service adopts
//! that environment, runs the operation with its standard output and
//! standard error relayed back as they are written, and finishes every
//! request with a terminate directive carrying the client's exit status.
//!
//! ```text
//! client                          tetherd
//!   | -- {"operation": ...}\n -->   | replace environment
//!   |                               | dispatch through the registry
//!   | <-- {"operation":"emit-stdout",...}
//!   | <-- {"operation":"terminate","arguments":[0]}
//! ```
//!
//! Operations are registered up front in a
//! [`Registry`](tether_protocol::Registry) and share one state value behind a
//! lock, so concurrent clients are served one request at a time. A request
//! for [`EXIT_OPERATION`], an operation asking to terminate, or an operation
//! failure stops the whole service after relaying [`SHUTDOWN_NOTICE`].
//!
//! [`run_service`] drives the lifecycle: configuration via
//! [`tether_config`], structured telemetry, socket preparation, the accept
//! loop, and shutdown on request or signal.

mod bootstrap;
mod dispatch;
mod health;
pub mod operations;
mod process;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use dispatch::{EXIT_OPERATION, SHUTDOWN_NOTICE};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownReason, run_service};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
