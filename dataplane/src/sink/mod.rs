//! Write endpoint: rebuilds a table from parts arriving in any order.

mod base;
mod dml;
mod strategy;

pub use base::*;
pub use dml::build_insert_statement;
pub use strategy::*;
