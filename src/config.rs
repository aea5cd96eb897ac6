//! Process configuration: an optional TOML file, then environment overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "PLANNER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "planner.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the local JSON collections.
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            sync: SyncConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub shared_mode: bool,
    /// Shared directory used as the remote store.
    pub remote_dir: Option<PathBuf>,
    pub resync_interval_secs: u64, // 0 disables the periodic re-sync
    /// Create the bucket-names table when opening the remote store.
    pub provision_bucket_names: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            shared_mode: false,
            remote_dir: None,
            resync_interval_secs: 60,
            provision_bucket_names: true,
        }
    }
}

impl SyncConfig {
    /// Remote location, only when sync is switched on.
    pub fn remote_dir(&self) -> Option<&Path> {
        if self.enabled { self.remote_dir.as_deref() } else { None }
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }
}

impl Config {
    /// Load from `$PLANNER_CONFIG` (or `planner.toml`), then apply `PLANNER_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::from_file(&path)?;
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("PLANNER_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("PLANNER_BIND") {
            self.bind = parse_env("PLANNER_BIND", raw)?;
        }
        if let Some(raw) = lookup("PLANNER_SYNC_ENABLED") {
            self.sync.enabled = parse_flag("PLANNER_SYNC_ENABLED", raw)?;
        }
        if let Some(raw) = lookup("PLANNER_SHARED_MODE") {
            self.sync.shared_mode = parse_flag("PLANNER_SHARED_MODE", raw)?;
        }
        if let Some(dir) = lookup("PLANNER_REMOTE_DIR") {
            self.sync.remote_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup("PLANNER_RESYNC_SECS") {
            self.sync.resync_interval_secs = parse_env("PLANNER_RESYNC_SECS", raw)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { var, value })
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            data_dir = "/var/lib/planner"

            [sync]
            enabled = true
            remote_dir = "/mnt/shared/planner"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/planner"));
        assert_eq!(config.bind, Config::default().bind);
        assert_eq!(config.sync.resync_interval_secs, 60);
        assert!(config.sync.provision_bucket_names);
        assert_eq!(config.sync.remote_dir(), Some(Path::new("/mnt/shared/planner")));
    }

    #[test]
    fn remote_requires_enabled_flag() {
        let mut config = Config::default();
        config.sync.remote_dir = Some(PathBuf::from("/tmp/remote"));
        assert_eq!(config.sync.remote_dir(), None);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PLANNER_BIND", "0.0.0.0:8080"),
            ("PLANNER_SYNC_ENABLED", "yes"),
            ("PLANNER_SHARED_MODE", "1"),
            ("PLANNER_RESYNC_SECS", "0"),
        ]);
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert!(config.sync.enabled);
        assert!(config.sync.shared_mode);
        assert_eq!(config.sync.resync_interval(), None);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "PLANNER_SYNC_ENABLED").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PLANNER_SYNC_ENABLED", .. }));
    }
}
