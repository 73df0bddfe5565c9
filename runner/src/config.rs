use config::shared::{DataPlaneConfig, ValidationError};
use config::{Config, load_config};
use serde::{Deserialize, Serialize};

/// Configuration of the `dataplane-runner` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub dataplane: DataPlaneConfig,
}

impl Config for RunnerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.dataplane.validate()
    }
}

/// Loads and validates the runner configuration.
pub fn load_runner_config() -> anyhow::Result<RunnerConfig> {
    let config = load_config::<RunnerConfig>()?;

    Ok(config)
}
