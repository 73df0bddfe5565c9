//! Tracing setup shared by the data plane binaries and tests.

pub mod tracing;
