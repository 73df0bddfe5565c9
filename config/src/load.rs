use std::{
    borrow::Cow,
    fmt, io,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::ValidationError;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Implemented by top-level configuration structures loaded through [`load_config`].
pub trait Config {
    /// Checks invariants the deserializer cannot express.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Identifies which configuration file is being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    Base,
    Environment(Environment),
}

impl ConfigFileKind {
    fn stem(&self) -> Cow<'static, str> {
        match self {
            ConfigFileKind::Base => Cow::Borrowed("base"),
            ConfigFileKind::Environment(env) => Cow::Borrowed(env.as_str()),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate {kind_description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        kind_description: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to build configuration: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Loads configuration from the `configuration` directory under the working directory.
///
/// See [`load_config_from`].
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads hierarchical configuration from base, environment, and environment-variable sources.
///
/// Reads `base.(yaml|yml|json)` and `{environment}.(yaml|yml|json)` from `directory`, then
/// applies `APP_`-prefixed environment variables. Nested keys use double underscores
/// (`APP_DATAPLANE__WRITE_MODE`). The result is validated before it is returned.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = find_configuration_file(directory, ConfigFileKind::Base)?;
    let environment_file =
        find_configuration_file(directory, ConfigFileKind::Environment(environment))?;

    let environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    let settings = rust_cli_config::Config::builder()
        .add_source(rust_cli_config::File::from(base_file))
        .add_source(rust_cli_config::File::from(environment_file))
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?;

    let config = settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)?;
    config.validate()?;

    Ok(config)
}

/// Finds the configuration file that matches the requested kind.
fn find_configuration_file(
    directory: &Path,
    kind: ConfigFileKind,
) -> Result<PathBuf, LoadConfigError> {
    let stem = kind.stem();
    let mut attempted_paths = Vec::with_capacity(CONFIG_FILE_EXTENSIONS.len());

    for extension in CONFIG_FILE_EXTENSIONS {
        let path = directory.join(format!("{stem}.{extension}"));
        if path.is_file() {
            return Ok(path);
        }
        attempted_paths.push(path);
    }

    let attempted = attempted_paths
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        kind_description: kind.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{DataPlaneConfig, WriteMode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        dataplane: DataPlaneConfig,
    }

    impl Config for TestConfig {
        fn validate(&self) -> Result<(), ValidationError> {
            self.dataplane.validate()
        }
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn environment_file_overrides_base() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        write(
            dir,
            "base.yaml",
            "dataplane:\n  write_mode: streaming_append\n  job_poll_interval_ms: 250\n",
        );
        write(dir, "prod.yaml", "dataplane:\n  write_mode: accumulated_dml\n");

        let config: TestConfig = load_config_from(dir, Environment::Prod).unwrap();

        assert_eq!(config.dataplane.write_mode, WriteMode::AccumulatedDml);
        assert_eq!(config.dataplane.job_poll_interval_ms, 250);
        assert_eq!(
            config.dataplane.partition_size,
            DataPlaneConfig::DEFAULT_PARTITION_SIZE
        );
    }

    #[test]
    fn missing_environment_file_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        write(dir, "base.json", r#"{"dataplane": {}}"#);

        let err = load_config_from::<TestConfig>(dir, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::ConfigurationFileMissing { .. }
        ));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        write(dir, "base.yaml", "dataplane:\n  partition_size: 0\n");
        write(dir, "dev.yaml", "{}\n");

        let err = load_config_from::<TestConfig>(dir, Environment::Dev).unwrap_err();

        assert!(matches!(err, LoadConfigError::Validation(_)));
    }
}
