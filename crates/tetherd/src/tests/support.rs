//! Shared helpers for the service test suites.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use tether_protocol::{RelayMessage, Request, decode_concatenated};

use crate::dispatch::{Service, SessionEnd, run_session};
use crate::operations::{self, ServiceState};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Serialises environment access and restores the captured environment on drop.
///
/// Every test that dispatches a request must hold one: sessions replace the
/// whole process environment.
pub(crate) struct EnvSnapshot {
    saved: Vec<(OsString, OsString)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        Self {
            saved: env::vars_os().collect(),
            _guard: guard,
        }
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        let current: Vec<OsString> = env::vars_os().map(|(key, _)| key).collect();
        for key in current {
            // SAFETY: the snapshot still holds the environment lock.
            unsafe { env::remove_var(&key) };
        }
        for (key, value) in &self.saved {
            // SAFETY: as above.
            unsafe { env::set_var(key, value) };
        }
    }
}

/// What one session produced.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub(crate) end: SessionEnd,
    pub(crate) relays: Vec<RelayMessage>,
}

impl Exchange {
    /// Text of every relay sent to the given client operation, in order.
    pub(crate) fn emitted(&self, operation: &str) -> String {
        self.relays
            .iter()
            .filter(|relay| relay.operation == operation)
            .filter_map(|relay| relay.arguments.first().and_then(|text| text.as_str()))
            .collect()
    }

    /// Code carried by the final terminate directive.
    pub(crate) fn exit_code(&self) -> Option<i64> {
        self.relays
            .iter()
            .rev()
            .find(|relay| relay.is_terminate())
            .and_then(|relay| relay.arguments.first())
            .and_then(serde_json::Value::as_i64)
    }
}

/// Service built from the example operations, driven over in-memory sessions.
pub(crate) struct SessionHarness {
    service: Service<ServiceState>,
}

impl SessionHarness {
    pub(crate) fn new() -> Self {
        let registry = operations::registry().expect("build example registry");
        Self {
            service: Service::new(registry, ServiceState::default()),
        }
    }

    /// Runs a session that reads `input` and then sees end of stream.
    pub(crate) fn exchange(&self, input: &[u8]) -> Exchange {
        exchange_with(&self.service, input)
    }

    pub(crate) fn state(&self) -> ServiceState {
        self.service.with_state(|state| state.clone())
    }
}

/// Runs one in-memory session against `service`.
pub(crate) fn exchange_with<S>(service: &Service<S>, input: &[u8]) -> Exchange {
    let mut reader = Cursor::new(input.to_vec());
    let mut output = Vec::new();
    let end = run_session(service, &mut reader, &mut output);
    let relays = decode_concatenated(&output)
        .collect::<Result<_, _>>()
        .expect("decode relayed output");
    Exchange { end, relays }
}

/// Encodes `requests` as one line each.
pub(crate) fn request_lines(requests: &[Request]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for request in requests {
        tether_protocol::write_request(&mut bytes, request).expect("encode request");
    }
    bytes
}

/// Builds a request carrying `environment`.
pub(crate) fn request(
    operation: &str,
    arguments: &[&str],
    environment: &BTreeMap<String, String>,
) -> Request {
    Request::new(
        operation,
        arguments.iter().map(|arg| (*arg).to_owned()).collect(),
        environment.clone(),
    )
}
