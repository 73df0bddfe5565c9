//! Part-stream transfer of tables between a pipeline and an analytical table store.
//!
//! A [`source::DataSource`] runs a query and emits the result as a schema part followed by
//! one part per row. A [`sink::DataSink`] accepts those parts in any order, holds rows back
//! until the schema is known and writes them with the configured
//! [`sink::WriteStrategy`]. The store itself is reached through the [`store::TableStore`]
//! seam, implemented for BigQuery in the `dataplane-bigquery` crate.

pub mod codec;
pub mod credentials;
pub mod error;
pub mod factory;
mod macros;
pub mod params;
pub mod query;
pub mod session;
pub mod sink;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
