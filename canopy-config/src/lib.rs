use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

pub mod defaults;
pub mod logging;
pub mod storage;

pub use defaults::{AxisIds, DefaultVariantsConfig};
pub use logging::LoggingConfig;
pub use storage::{StorageBackendKind, StorageConfig};

const CONFIG_ROOT_FOLDER: &str = "config/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Couldn't parse config at {path}. Reason: {message}")]
    Parse { path: String, message: String },
    #[error("Region size must be a positive multiple of 16, got {0}")]
    InvalidRegionSize(u32),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything the override cache needs to know about its surroundings.
#[derive(Deserialize, Serialize, Default, Clone, Debug)]
#[serde(default)]
pub struct CanopyConfiguration {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub defaults: DefaultVariantsConfig,
}

impl CanopyConfiguration {
    /// Loads `config/canopy.toml` relative to `exec_dir`, writing the defaults when it is missing.
    pub fn load(exec_dir: &Path) -> Result<Self, ConfigError> {
        <Self as LoadConfiguration>::load(exec_dir)
    }
}

trait LoadConfiguration {
    fn load(exec_dir: &Path) -> Result<Self, ConfigError>
    where
        Self: Sized + Default + Serialize + DeserializeOwned,
    {
        let config_dir = exec_dir.join(CONFIG_ROOT_FOLDER);
        if !config_dir.exists() {
            log::debug!("creating new config root folder");
            fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
                path: config_dir.display().to_string(),
                source,
            })?;
        }
        let path = config_dir.join(Self::get_path());

        let config = if path.exists() {
            let file_content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;

            toml::from_str(&file_content).map_err(|err| ConfigError::Parse {
                path: path.display().to_string(),
                message: err.message().to_string(),
            })?
        } else {
            let content = Self::default();

            match toml::to_string(&content) {
                Ok(serialized) => {
                    if let Err(err) = fs::write(&path, serialized) {
                        warn!(
                            "Couldn't write default config to {:?}. Reason: {}",
                            &path, err
                        );
                    }
                }
                Err(err) => warn!("Couldn't serialize default config: {}", err),
            }

            content
        };

        config.validate()?;
        Ok(config)
    }

    fn get_path() -> &'static Path;

    fn validate(&self) -> Result<(), ConfigError>;
}

impl LoadConfiguration for CanopyConfiguration {
    fn get_path() -> &'static Path {
        Path::new("canopy.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use canopy_util::Axis;
    use temp_dir::TempDir;

    use crate::{CanopyConfiguration, ConfigError, StorageBackendKind};

    #[test]
    fn writes_defaults_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config = CanopyConfiguration::load(temp_dir.path()).unwrap();

        assert_eq!(config.storage.chunk_version, 1);
        assert_eq!(config.storage.region_size, 528);
        assert_eq!(config.storage.backend, StorageBackendKind::File);
        assert!(temp_dir.path().join("config/canopy.toml").exists());

        // The written file must load back to the same values
        let reloaded = CanopyConfiguration::load(temp_dir.path()).unwrap();
        assert_eq!(reloaded.storage.read_threads, config.storage.read_threads);
    }

    #[test]
    fn reads_defaults_table() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("config")).unwrap();
        fs::write(
            temp_dir.path().join("config/canopy.toml"),
            r#"
[storage]
backend = "Memory"
chunk_version = 3

[defaults.leaf]
"minecraft:oak_leaves" = "default_oak_leaves"

[defaults.log."minecraft:oak_log"]
y = "default_oak_log"
"#,
        )
        .unwrap();

        let config = CanopyConfiguration::load(temp_dir.path()).unwrap();
        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
        assert_eq!(config.storage.chunk_version, 3);
        assert_eq!(
            config.defaults.leaf.get("minecraft:oak_leaves").map(String::as_str),
            Some("default_oak_leaves")
        );
        assert_eq!(
            config.defaults.log_id("minecraft:oak_log", Axis::Y),
            Some("default_oak_log")
        );
        assert_eq!(config.defaults.log_id("minecraft:oak_log", Axis::X), None);
    }

    #[test]
    fn rejects_bad_region_size() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("config")).unwrap();
        fs::write(
            temp_dir.path().join("config/canopy.toml"),
            "[storage]\nregion_size = 100\n",
        )
        .unwrap();

        assert!(matches!(
            CanopyConfiguration::load(temp_dir.path()),
            Err(ConfigError::InvalidRegionSize(100))
        ));
    }
}
