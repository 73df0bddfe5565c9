//! Core data types exchanged between sources, the transfer pipeline and sinks.
//!
//! A table travels as a sequence of [`Part`]s: one schema part describing the
//! [`TableSchema`] and one part per [`RowRecord`].

mod part;
mod row;
mod schema;

pub use part::*;
pub use row::*;
pub use schema::*;
