//! Command-line client for the tether service.
//!
//! `tether OPERATION [ARG]...` sends one request to the running service:
//! the operation name, its arguments verbatim, and a snapshot of the whole
//! environment. It then relays everything the service emits to the local
//! standard streams and exits with the code carried by the service's
//! `terminate` directive.
//!
//! Configuration flags (`--config-path`, `--daemon-socket`, `--log-filter`,
//! `--log-format`) are accepted before the operation name only.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use clap::error::ErrorKind;

use tether_protocol::{Request, write_request};

mod cli;
mod config;
mod errors;
mod reply;
mod transport;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, split_arguments};
pub(crate) use errors::AppError;
use reply::{client_registry, relay_replies};
use transport::{RetryPolicy, connect, connect_with_retry};

/// Prefix used on the client's own notices.
pub(crate) const CLIENT_NAME: &str = "tether";

/// Runs the client with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, &OrthoConfigLoader, RetryPolicy::STANDARD)
}

pub(crate) fn run_with<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    retry: RetryPolicy,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    match execute(&args, stdout, stderr, loader, retry) {
        Ok(exit_code) => exit_code,
        Err(AppError::MissingOperation) => {
            report(stdout, &AppError::MissingOperation);
            ExitCode::FAILURE
        }
        Err(AppError::CliUsage(error))
            if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            report(stdout, &AppError::CliUsage(error));
            ExitCode::SUCCESS
        }
        Err(error) => {
            report(stderr, &error);
            ExitCode::FAILURE
        }
    }
}

fn report(stream: &mut dyn Write, error: &AppError) {
    writeln!(stream, "{error}")
        .and_then(|()| stream.flush())
        .ok();
}

fn execute<W, E, L>(
    args: &[OsString],
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    retry: RetryPolicy,
) -> Result<ExitCode, AppError>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let split = split_arguments(args);
    let cli = Cli::try_parse_from(&split.command_arguments).map_err(AppError::CliUsage)?;
    let operation = cli.operation.ok_or(AppError::MissingOperation)?;
    let config = loader.load(&split.config_arguments)?;

    let registry = client_registry().map_err(AppError::RelayFailed)?;
    let request = Request::new(operation, cli.arguments, environment_snapshot());
    let mut connection = connect_with_retry(
        config.daemon_socket(),
        retry,
        connect,
        thread::sleep,
        stdout,
    )?;
    write_request(&mut connection, &request).map_err(AppError::SendRequest)?;
    relay_replies(&mut connection, &registry, stdout, stderr)
}

/// The caller's environment. Entries that are not valid UTF-8 cannot be
/// carried by the wire format and are left out.
fn environment_snapshot() -> BTreeMap<String, String> {
    env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

#[cfg(test)]
mod tests;
