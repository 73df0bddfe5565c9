//! Shared configuration types for the data plane services.

mod base;
mod dataplane;

pub use base::ValidationError;
pub use dataplane::{DataPlaneConfig, WriteMode};
