//! Static configuration for the data plane services.
//!
//! Request-scoped settings (project, dataset, table, credentials) travel with each transfer
//! request and are not part of this crate. What lives here is the process-wide configuration
//! loaded once at startup.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
