//! Replacement of the process environment with a caller's snapshot.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;

use tracing::warn;

use super::DISPATCH_TARGET;

/// Makes the process environment equal to `environment`.
///
/// Variables absent from the snapshot are removed, including ones whose
/// names are not valid UTF-8 and so could never appear in a request. Entries
/// the platform cannot represent (empty names, names containing `=`, or NUL
/// bytes) are skipped with a warning.
///
/// Callers must hold the service lock: nothing else in the process may read
/// or write the environment while this runs.
pub(crate) fn replace_environment(environment: &BTreeMap<String, String>) {
    let stale: Vec<OsString> = env::vars_os()
        .map(|(key, _)| key)
        .filter(|key| key.to_str().is_none_or(|key| !environment.contains_key(key)))
        .collect();

    for key in stale {
        // SAFETY: the service lock serialises every environment access made
        // by sessions, and no other thread touches the environment.
        unsafe { env::remove_var(&key) };
    }

    for (key, value) in environment {
        if !is_representable(key, value) {
            warn!(
                target: DISPATCH_TARGET,
                variable = %key,
                "skipping environment variable the platform cannot represent"
            );
            continue;
        }
        // SAFETY: as above.
        unsafe { env::set_var(key, value) };
    }
}

fn is_representable(key: &str, value: &str) -> bool {
    !key.is_empty() && !key.contains(['=', '\0']) && !value.contains('\0')
}
