//! Shutdown coordination between sessions, signals, and the launcher.
//!
//! Any session may end the whole service. It does so by sending a
//! [`ShutdownReason`] through a [`ShutdownTrigger`]; the launcher blocks on the
//! matching [`ShutdownMonitor`] and tears the listener down when the first
//! reason arrives. Termination signals feed the same channel.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Why the service is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A session ended the service with the given process exit code.
    Requested {
        /// Exit status for the service process.
        exit_code: u8,
    },
    /// A termination signal arrived.
    Signal(i32),
}

impl ShutdownReason {
    /// Exit status the service process should end with.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Requested { exit_code } => exit_code,
            Self::Signal(_) => 0,
        }
    }
}

/// Errors reported by the shutdown machinery.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Sending half handed to every session.
#[derive(Debug, Clone)]
pub(crate) struct ShutdownTrigger {
    sender: Sender<ShutdownReason>,
}

impl ShutdownTrigger {
    pub(crate) fn request(&self, reason: ShutdownReason) {
        if self.sender.send(reason).is_err() {
            debug!(
                target: PROCESS_TARGET,
                ?reason,
                "shutdown already in progress"
            );
        }
    }
}

/// Receiving half owned by the launcher.
pub(crate) struct ShutdownMonitor {
    receiver: Receiver<ShutdownReason>,
    signals: Option<Handle>,
}

pub(crate) fn shutdown_channel() -> (ShutdownTrigger, ShutdownMonitor) {
    let (sender, receiver) = mpsc::channel();
    (
        ShutdownTrigger { sender },
        ShutdownMonitor {
            receiver,
            signals: None,
        },
    )
}

impl ShutdownMonitor {
    /// Forwards SIGTERM, SIGINT, SIGQUIT, and SIGHUP to `trigger`.
    pub(crate) fn watch_signals(&mut self, trigger: ShutdownTrigger) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        self.signals = Some(signals.handle());
        thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(
                    target: PROCESS_TARGET,
                    signal,
                    "shutdown signal received"
                );
                trigger.request(ShutdownReason::Signal(signal));
            }
        });
        Ok(())
    }

    /// Blocks until the first shutdown reason arrives.
    ///
    /// If every trigger has been dropped without a request the service can
    /// never be asked to stop, so this is reported as a clean shutdown.
    pub(crate) fn wait(self) -> ShutdownReason {
        let reason = self
            .receiver
            .recv()
            .unwrap_or(ShutdownReason::Requested { exit_code: 0 });
        if let Some(handle) = &self.signals {
            handle.close();
        }
        reason
    }
}
