//! CLI entrypoint for the tether client.
//!
//! The binary delegates to [`tether_cli::run`], which loads configuration,
//! sends the requested operation to the service, and relays its output.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    tether_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
