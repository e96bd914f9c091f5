//! Test suites for the wire protocol.
