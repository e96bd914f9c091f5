//! Service lifecycle: launch sequencing and shutdown coordination.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::run_service;
#[cfg(test)]
pub(crate) use launch::{LaunchPlan, SignalMode, run_service_with};
pub use shutdown::{ShutdownError, ShutdownReason};
pub(crate) use shutdown::ShutdownTrigger;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
