//! Service configuration.
//!
//! Read from an optional TOML file (path in `LODGE_RATES_CONFIG`, default
//! `lodge-rates.toml`). A missing file means defaults; a few `LODGE_RATES_*`
//! environment variables override individual keys afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::gateway::{ClientConfig, DEFAULT_RATES_URL};
use crate::transform::{UnitTypeTable, DELUXE_SUITE_ID, STANDARD_ROOM_ID};

pub const CONFIG_PATH_ENV: &str = "LODGE_RATES_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "lodge-rates.toml";

const HOST_ENV: &str = "LODGE_RATES_HOST";
const PORT_ENV: &str = "LODGE_RATES_PORT";
const URL_ENV: &str = "LODGE_RATES_URL";
const AUDIT_LOG_ENV: &str = "LODGE_RATES_AUDIT_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rates_url: String,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    /// Empty string disables the audit log.
    pub audit_log: PathBuf,
    pub expose_error_trace: bool,
    pub log_level: String,
    pub log_format: LogFormat,
    pub default_unit_id: i64,
    pub units: HashMap<String, i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            rates_url: DEFAULT_RATES_URL.to_string(),
            timeout_secs: 30,
            accept_invalid_certs: true,
            audit_log: PathBuf::from("logs/api.log"),
            expose_error_trace: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            default_unit_id: STANDARD_ROOM_ID,
            units: HashMap::from([
                ("Standard Room".to_string(), STANDARD_ROOM_ID),
                ("Deluxe Suite".to_string(), DELUXE_SUITE_ID),
            ]),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: PORT_ENV,
                value: port.clone(),
            })?;
        }
        if let Some(url) = lookup(URL_ENV) {
            self.rates_url = url;
        }
        if let Some(path) = lookup(AUDIT_LOG_ENV) {
            self.audit_log = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn audit_log_path(&self) -> Option<&Path> {
        if self.audit_log.as_os_str().is_empty() {
            None
        } else {
            Some(&self.audit_log)
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.rates_url.clone(),
            timeout_ms: Duration::from_secs(self.timeout_secs).as_millis() as u64,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    pub fn unit_table(&self) -> UnitTypeTable {
        UnitTypeTable {
            units: self.units.clone(),
            default_id: self.default_unit_id,
        }
    }
}
