//! BigQuery implementation of the data plane table store.
//!
//! [`BigQueryConnector`] authenticates with a service-account key file, with the ambient
//! application default credentials or by impersonating a service account, and hands out
//! [`BigQueryStore`] clients talking to the BigQuery REST API.

mod client;
mod connector;
mod credentials;
mod error;
mod impersonation;

pub use client::BigQueryStore;
pub use connector::BigQueryConnector;
pub use credentials::load_service_account_key;
pub use impersonation::{ImpersonatedAuthenticator, SourceTokenFn};
