use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::shared::ValidationError;

/// How the sink materializes rows in the destination table.
///
/// The mode is chosen once per sink and never changes while a transfer runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// One streaming insert call per row. Per-row failures are reported, not fatal.
    #[default]
    StreamingAppend,
    /// One `INSERT ... VALUES` DML job per row. Any job failure aborts the transfer.
    AccumulatedDml,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::StreamingAppend => f.write_str("streaming_append"),
            WriteMode::AccumulatedDml => f.write_str("accumulated_dml"),
        }
    }
}

/// Process-wide data plane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DataPlaneConfig {
    /// Write strategy used by every sink created by this process.
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Delay between two job status polls while waiting for a job to finish.
    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,
    /// Number of parts handed to a single sink task.
    #[serde(default = "default_partition_size")]
    pub partition_size: usize,
    /// Lifetime requested for impersonated access tokens.
    #[serde(default = "default_impersonation_token_lifetime_secs")]
    pub impersonation_token_lifetime_secs: u64,
}

impl DataPlaneConfig {
    /// Default delay between job polls.
    pub const DEFAULT_JOB_POLL_INTERVAL_MS: u64 = 1000;

    /// Default number of parts per sink task.
    pub const DEFAULT_PARTITION_SIZE: usize = 5;

    /// Default lifetime of impersonated access tokens.
    pub const DEFAULT_IMPERSONATION_TOKEN_LIFETIME_SECS: u64 = 300;

    /// Upper bound accepted by the IAM credentials API for token lifetimes.
    pub const MAX_IMPERSONATION_TOKEN_LIFETIME_SECS: u64 = 3600;

    /// Returns the job poll interval as a [`Duration`].
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    /// Returns the impersonated token lifetime as a [`Duration`].
    pub fn impersonation_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.impersonation_token_lifetime_secs)
    }

    /// Validates the data plane settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.partition_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "dataplane.partition_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.impersonation_token_lifetime_secs == 0
            || self.impersonation_token_lifetime_secs > Self::MAX_IMPERSONATION_TOKEN_LIFETIME_SECS
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "dataplane.impersonation_token_lifetime_secs".to_string(),
                constraint: format!(
                    "must be between 1 and {}",
                    Self::MAX_IMPERSONATION_TOKEN_LIFETIME_SECS
                ),
            });
        }

        Ok(())
    }
}

impl Default for DataPlaneConfig {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::default(),
            job_poll_interval_ms: default_job_poll_interval_ms(),
            partition_size: default_partition_size(),
            impersonation_token_lifetime_secs: default_impersonation_token_lifetime_secs(),
        }
    }
}

fn default_job_poll_interval_ms() -> u64 {
    DataPlaneConfig::DEFAULT_JOB_POLL_INTERVAL_MS
}

fn default_partition_size() -> usize {
    DataPlaneConfig::DEFAULT_PARTITION_SIZE
}

fn default_impersonation_token_lifetime_secs() -> u64 {
    DataPlaneConfig::DEFAULT_IMPERSONATION_TOKEN_LIFETIME_SECS
}
