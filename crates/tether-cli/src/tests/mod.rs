//! Test suites for the tether client.

mod support;
