use super::app_config::MediaConfig;
use directories::ProjectDirs;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";
const APP_NAME: &str = "optimedia";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Reads and writes `config.toml` in the platform config directory.
pub struct StorageManager {
    config_dir: PathBuf,
}

impl StorageManager {
    /// Uses the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration directory cannot be determined.
    pub fn new() -> Result<Self, ConfigError> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| Self::with_dir(dirs.config_dir().to_path_buf()))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Uses `path` as the config directory.
    #[must_use]
    pub fn with_dir(path: PathBuf) -> Self {
        Self { config_dir: path }
    }

    /// Returns the configuration directory path.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Returns the config file used when no override is given.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Loads the configuration from `path_override` or the default file.
    ///
    /// A missing file is created with defaults. A file that does not parse is
    /// left untouched and defaults are used for this run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or the defaults cannot
    /// be written.
    pub fn load_config(&self, path_override: Option<&Path>) -> Result<MediaConfig, ConfigError> {
        let config_path = path_override.map_or_else(|| self.config_file(), Path::to_path_buf);

        match Self::read_config(&config_path)? {
            Some(config) => {
                debug!(path = %config_path.display(), "Loaded configuration");
                Ok(config)
            }
            None => {
                info!(path = %config_path.display(), "Writing default configuration");
                let config = MediaConfig::default();
                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                write_atomic(&config_path, &config)?;
                Ok(config)
            }
        }
    }

    /// Writes the configuration to the default file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be written.
    pub fn save_config(&self, config: &MediaConfig) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir)?;
        write_atomic(&self.config_file(), config)
    }

    fn read_config(path: &Path) -> Result<Option<MediaConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let config = toml::from_str::<MediaConfig>(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Malformed config file, using defaults");
            MediaConfig::default()
        });
        Ok(Some(config))
    }
}

fn write_atomic<T: Serialize>(path: &Path, data: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(data)?;

    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("config path has no parent directory"))?;
    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::BackendKind;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_written_with_defaults() {
        let dir = tempdir().unwrap();
        let manager = StorageManager::with_dir(dir.path().join("optimedia"));

        let config = manager.load_config(None).unwrap();

        assert_eq!(config.signing.grant_ttl_secs, 3600);
        let written = fs::read_to_string(manager.config_file()).unwrap();
        assert!(written.contains("[signing]"));
        assert!(written.contains("optimized-media:"));
    }

    #[test]
    fn test_malformed_file_left_untouched() {
        let dir = tempdir().unwrap();
        let manager = StorageManager::with_dir(dir.path().to_path_buf());
        fs::write(manager.config_file(), "[cache\nbackend = ").unwrap();

        let config = manager.load_config(None).unwrap();

        assert_eq!(config.preload.limit, 6);
        let content = fs::read_to_string(manager.config_file()).unwrap();
        assert_eq!(content, "[cache\nbackend = ");
    }

    #[test]
    fn test_override_path_used() {
        let dir = tempdir().unwrap();
        let manager = StorageManager::with_dir(dir.path().join("unused"));
        let custom = dir.path().join("custom.toml");
        fs::write(&custom, "[cache]\nbackend = \"none\"\n").unwrap();

        let config = manager.load_config(Some(&custom)).unwrap();

        assert_eq!(config.cache.backend, BackendKind::None);
        assert!(!manager.config_file().exists());
    }

    #[test]
    fn test_saved_config_round_trips() {
        let dir = tempdir().unwrap();
        let manager = StorageManager::with_dir(dir.path().to_path_buf());

        let mut config = MediaConfig::default();
        config.signing.endpoint = "https://example.test/sign".to_string();
        config.cache.single_flight = true;
        manager.save_config(&config).unwrap();

        let loaded = manager.load_config(None).unwrap();
        assert_eq!(loaded.signing.endpoint, "https://example.test/sign");
        assert!(loaded.cache.single_flight);
    }
}
