//! Example operations served by the `tetherd` binary.
//!
//! They show the two things a tethered service is for: state that survives
//! between invocations (`set-thing`/`get-thing`) and observing the caller's
//! environment (`print-env`). `stop` exercises explicit termination.

use std::collections::BTreeMap;
use std::env;

use tether_protocol::{Flow, Invocation, OperationError, Registry, Signature};

use crate::dispatch::EXIT_OPERATION;

const THING: &str = "thing";

/// State shared by the example operations for the lifetime of the service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceState {
    variables: BTreeMap<String, String>,
}

impl ServiceState {
    /// Returns the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Stores `value` under `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }
}

type Call<'a> = Invocation<'a, ServiceState, String>;

/// Builds the registry of example operations.
///
/// The `exit` control name is reserved before anything is registered.
///
/// # Errors
///
/// Returns [`OperationError::Reserved`] if an operation name collides with
/// the reserved control name.
pub fn registry() -> Result<Registry<ServiceState, String>, OperationError> {
    let mut registry = Registry::new();
    registry.reserve(EXIT_OPERATION);
    registry.register("set-thing", Signature::new(["value"]), set_thing)?;
    registry.register("get-thing", Signature::empty(), get_thing)?;
    registry.register("print-env", Signature::new(["name"]), print_env)?;
    registry.register("stop", Signature::new(["code"]), stop)?;
    Ok(registry)
}

fn set_thing(call: Call<'_>) -> Result<Flow, OperationError> {
    let value = call.argument(0)?;
    call.state.set(THING, value.as_str());
    writeln!(call.stdout, "variable {THING} is now \"{value}\"")?;
    Ok(Flow::Continue)
}

fn get_thing(call: Call<'_>) -> Result<Flow, OperationError> {
    let Some(value) = call.state.get(THING) else {
        return Err(OperationError::failed(format!(
            "variable {THING} has not been set; run set-thing first"
        )));
    };
    writeln!(call.stdout, "{THING} = \"{value}\"")?;
    Ok(Flow::Continue)
}

fn print_env(call: Call<'_>) -> Result<Flow, OperationError> {
    let name = call.argument(0)?;
    let value = env::var(name).map_err(|error| {
        OperationError::caused_by(format!("cannot read environment variable {name}"), error)
    })?;
    writeln!(call.stdout, "{name}={value}")?;
    Ok(Flow::Continue)
}

fn stop(call: Call<'_>) -> Result<Flow, OperationError> {
    let raw = call.argument(0)?;
    let code = raw.parse().map_err(|_| {
        OperationError::invalid_argument(call.operation, format!("'{raw}' is not an exit code"))
    })?;
    Ok(Flow::Terminate(code))
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    struct Harness {
        registry: Registry<ServiceState, String>,
        state: ServiceState,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    }

    impl Harness {
        fn call(&mut self, operation: &str, arguments: &[&str]) -> Result<Flow, OperationError> {
            let arguments: Vec<String> = arguments.iter().map(|arg| (*arg).to_owned()).collect();
            self.registry.dispatch(Invocation {
                operation,
                state: &mut self.state,
                stdout: &mut self.stdout,
                stderr: &mut self.stderr,
                arguments: &arguments,
            })
        }

        fn stdout(&self) -> String {
            String::from_utf8(self.stdout.clone()).expect("utf8 stdout")
        }
    }

    #[fixture]
    fn harness() -> Harness {
        Harness {
            registry: registry().expect("build registry"),
            state: ServiceState::default(),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    #[rstest]
    fn set_then_get_shares_state(mut harness: Harness) {
        harness.call("set-thing", &["hello"]).expect("set-thing");
        harness.call("get-thing", &[]).expect("get-thing");

        assert_eq!(harness.state.get(THING), Some("hello"));
        assert_eq!(
            harness.stdout(),
            "variable thing is now \"hello\"\nthing = \"hello\"\n"
        );
        assert!(harness.stderr.is_empty());
    }

    #[rstest]
    fn get_before_set_fails(mut harness: Harness) {
        let error = harness.call("get-thing", &[]).expect_err("unset thing");
        assert!(error.to_string().contains("has not been set"));
    }

    #[rstest]
    #[case::positive("3", 3)]
    #[case::negative("-2", -2)]
    fn stop_requests_termination(mut harness: Harness, #[case] raw: &str, #[case] code: i32) {
        let flow = harness.call("stop", &[raw]).expect("stop");
        assert_eq!(flow, Flow::Terminate(code));
    }

    #[rstest]
    fn stop_rejects_non_numeric_code(mut harness: Harness) {
        let error = harness.call("stop", &["soon"]).expect_err("bad code");
        assert!(matches!(error, OperationError::InvalidArgument { .. }));
    }

    #[rstest]
    fn registry_lists_operations_with_signatures(harness: Harness) {
        assert_eq!(
            harness.registry.catalogue(),
            "  • get-thing()\n  • print-env(name)\n  • set-thing(value)\n  • stop(code)\n"
        );
        assert!(harness.registry.is_reserved(EXIT_OPERATION));
    }
}
