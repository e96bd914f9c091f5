//! Test suites for the tether service.

mod launch;
pub(crate) mod support;
