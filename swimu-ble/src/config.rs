//! Settings stored in SWIMU_HOME

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use swimu_client::Timeouts;
use swimu_proto::ble::TARGET_DEVICE_NAME;

const CONFIG_FILE: &str = "config.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("no home directory, set SWIMU_HOME")]
    NoHome,

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Get SWIMU_HOME directory, creating it if needed
pub fn swimu_home() -> Result<PathBuf, ConfigError> {
    let home = resolve_home(std::env::var_os("SWIMU_HOME").map(PathBuf::from))?;
    fs::create_dir_all(&home).map_err(|source| ConfigError::Io {
        path: home.clone(),
        source,
    })?;
    Ok(home)
}

fn resolve_home(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(home) => Ok(home),
        None => dirs::home_dir()
            .map(|h| h.join(".swimu"))
            .ok_or(ConfigError::NoHome),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub operation_ms: u64,
    pub transfer_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let defaults = Timeouts::default();
        Self {
            operation_ms: defaults.operation.as_millis() as u64,
            transfer_ms: defaults.transfer.as_millis() as u64,
        }
    }
}

/// Contents of `config.json`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Substring matched against advertised device names
    pub target_name: String,
    pub scan_secs: u64,
    pub timeouts: TimeoutConfig,
    /// Where received files go; `SWIMU_HOME/downloads` when unset
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_name: TARGET_DEVICE_NAME.to_string(),
            scan_secs: 5,
            timeouts: TimeoutConfig::default(),
            output_dir: None,
        }
    }
}

impl Config {
    /// Load `config.json` from `home`, writing the defaults there first if
    /// it does not exist yet
    pub fn load_or_create(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        if path.exists() {
            let data = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            return serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path, source });
        }

        let config = Self::default();
        config.save(home)?;
        Ok(config)
    }

    /// Write `config.json` into `home`
    pub fn save(&self, home: &Path) -> Result<(), ConfigError> {
        let path = home.join(CONFIG_FILE);
        let data = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, data).map_err(|source| ConfigError::Io { path, source })
    }

    /// Deadlines for the connection handle
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            operation: Duration::from_millis(self.timeouts.operation_ms),
            transfer: Duration::from_millis(self.timeouts.transfer_ms),
        }
    }

    /// Directory for received files
    pub fn output_dir(&self, home: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| home.join("downloads"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_defaults() {
        let home = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(home.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(home.path().join(CONFIG_FILE).exists());

        // second load reads the file back
        assert_eq!(Config::load_or_create(home.path()).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let home = tempfile::tempdir().unwrap();
        fs::write(
            home.path().join(CONFIG_FILE),
            r#"{"target_name": "SwIMU-7", "timeouts": {"transfer_ms": 1000}}"#,
        )
        .unwrap();

        let config = Config::load_or_create(home.path()).unwrap();
        assert_eq!(config.target_name, "SwIMU-7");
        assert_eq!(config.scan_secs, 5);
        assert_eq!(
            config.timeouts(),
            Timeouts {
                operation: Duration::from_secs(20),
                transfer: Duration::from_secs(1),
            }
        );
    }

    #[test]
    fn bad_json() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join(CONFIG_FILE), "{ nope").unwrap();
        assert!(matches!(
            Config::load_or_create(home.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn output_dir_defaults_under_home() {
        let home = Path::new("/data/swimu");
        let mut config = Config::default();
        assert_eq!(config.output_dir(home), home.join("downloads"));
        config.output_dir = Some(PathBuf::from("/tmp/logs"));
        assert_eq!(config.output_dir(home), PathBuf::from("/tmp/logs"));
    }

    #[test]
    fn explicit_home_wins() {
        let explicit = PathBuf::from("/srv/swimu");
        assert_eq!(resolve_home(Some(explicit.clone())).unwrap(), explicit);
    }
}
