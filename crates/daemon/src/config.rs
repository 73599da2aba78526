// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, read from `thermolog.toml`.
//!
//! ```toml
//! [device]
//! topic_prefix = "lab/floor2/"
//! sensor_id = "Sensor_One"
//!
//! [broker]
//! host = "broker.local"
//! username = "sensor"
//! password = "secret"
//!
//! [delivery]
//! rotation_cap = 20
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tl_core::{DeliveryConfig, DeviceIdentity};

use crate::env;
use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "thermolog";
const CONFIG_FILE_NAME: &str = "thermolog.toml";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceIdentity,
    pub broker: BrokerConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

/// Temperature source.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// Sysfs file holding the temperature in millidegrees Celsius.
    #[serde(default = "default_sensor_path")]
    pub path: PathBuf,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            path: default_sensor_path(),
        }
    }
}

fn default_sensor_path() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

/// Where batches and logs go.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root of the batch buffer. Also holds the instance lock.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    /// Log file. Logs go to stderr when unset or when it cannot be opened.
    pub log_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            dir: default_storage_dir(),
            log_file: None,
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .unwrap_or_else(|| PathBuf::from(".local/state"))
        .join(CONFIG_DIR_NAME)
}

impl Config {
    /// Loads and validates the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parses and validates a config document.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        if config.device.sensor_id.is_empty() {
            return Err(Error::Config("device.sensor_id must not be empty".to_string()));
        }
        if config.broker.host.is_empty() {
            return Err(Error::Config("broker.host must not be empty".to_string()));
        }
        config.delivery.validate()?;
        Ok(config)
    }
}

/// Resolves the config file path: `--config <path>`, then
/// `THERMOLOG_CONFIG`, then the XDG config directory.
pub fn config_path(args: &[String]) -> PathBuf {
    let flag = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1));
    if let Some(path) = flag {
        return PathBuf::from(path);
    }
    if let Some(path) = env::config_path() {
        return path;
    }
    if let Some(dir) = env::xdg_config_home() {
        return dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
    }
    dirs::home_dir()
        .map(|h| h.join(".config").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
