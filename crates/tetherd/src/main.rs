use std::env;
use std::process::ExitCode;

use tetherd::operations::{self, ServiceState};

fn main() -> ExitCode {
    if env::args_os().len() > 1 {
        eprintln!("Error: {} takes no arguments", env!("CARGO_PKG_NAME"));
        return ExitCode::FAILURE;
    }

    let registry = match operations::registry() {
        Ok(registry) => registry,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    match tetherd::run_service(registry, ServiceState::default()) {
        Ok(reason) => ExitCode::from(reason.exit_code()),
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
