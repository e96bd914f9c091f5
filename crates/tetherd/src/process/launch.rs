//! Supervises service launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use tether_protocol::Registry;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{Service, SessionHandler};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::shutdown::{ShutdownReason, shutdown_channel};
use super::PROCESS_TARGET;

/// Whether termination signals end the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalMode {
    /// Install handlers for SIGTERM, SIGINT, SIGQUIT, and SIGHUP.
    Watch,
    /// Leave signal dispositions alone; used when the service runs in-process.
    Ignore,
}

/// Collaborators required to launch the service.
pub(crate) struct LaunchPlan<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) signals: SignalMode,
}

/// Runs the service until a session or a signal stops it.
///
/// Configuration comes from the configuration file and `TETHER_*`
/// environment variables. The returned reason carries the exit status the
/// process should end with.
///
/// # Errors
///
/// Returns a [`LaunchError`] when bootstrap, socket binding, or signal
/// installation fails.
pub fn run_service<S>(registry: Registry<S, String>, state: S) -> Result<ShutdownReason, LaunchError>
where
    S: Send + 'static,
{
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        signals: SignalMode::Watch,
    };
    run_service_with(plan, registry, state)
}

/// Runs the service with injected collaborators.
pub(crate) fn run_service_with<L, S>(
    plan: LaunchPlan<L>,
    registry: Registry<S, String>,
    state: S,
) -> Result<ShutdownReason, LaunchError>
where
    L: ConfigLoader,
    S: Send + 'static,
{
    let LaunchPlan {
        loader,
        reporter,
        signals,
    } = plan;

    let bootstrapped = bootstrap_with(&loader, reporter.as_ref())?;
    let endpoint = bootstrapped.config().daemon_socket().clone();
    info!(
        target: PROCESS_TARGET,
        endpoint = %endpoint,
        ?signals,
        "starting service runtime"
    );

    let listener = SocketListener::bind(&endpoint)?;
    println!("Creating socket at {}", listener.endpoint());
    reporter.listener_ready(listener.endpoint());

    let (trigger, mut monitor) = shutdown_channel();
    if signals == SignalMode::Watch {
        monitor.watch_signals(trigger.clone())?;
    }

    let service = Arc::new(Service::new(registry, state));
    let handler = Arc::new(SessionHandler::new(service, trigger));
    let listener_handle = listener.start(handler)?;

    let reason = monitor.wait();
    reporter.shutdown_started(reason);
    listener_handle.shutdown();
    listener_handle.join()?;
    info!(
        target: PROCESS_TARGET,
        exit_code = reason.exit_code(),
        "shutdown sequence completed"
    );
    Ok(reason)
}
