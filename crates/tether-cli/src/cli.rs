//! Command-line argument definitions for the tether client.

use clap::Parser;

/// Runs an operation inside the tether service.
#[derive(Parser, Debug)]
#[command(name = "tether", version)]
pub(crate) struct Cli {
    /// Name of the operation to run (for example `set-thing`).
    #[arg(value_name = "OPERATION")]
    pub(crate) operation: Option<String>,
    /// Arguments forwarded verbatim to the operation.
    #[arg(
        value_name = "ARG",
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) arguments: Vec<String>,
}
