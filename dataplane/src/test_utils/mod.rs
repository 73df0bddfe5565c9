//! Test doubles for the store seam.
//!
//! [`memory_store::MemoryStore`] keeps jobs, streamed rows and DML statements in memory and
//! can be told to fail in specific ways. [`connector::CountingConnector`] hands out a shared
//! store and counts how often a connection was requested.

pub mod connector;
pub mod memory_store;
pub mod schema;
