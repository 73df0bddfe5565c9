//! The seam between the data plane and the table store.
//!
//! The core only talks to the store through [`TableStore`]. Store implementations live in
//! their own crates and are created by a [`StoreConnector`].

mod base;
mod job;

pub use base::*;
pub use job::*;
