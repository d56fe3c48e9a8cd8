//! Configuration types for the GIOŚ service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Check the values that have no usable default
    pub fn validate(&self) -> crate::Result<()> {
        if self.station.station_id == 0 {
            return Err(crate::GiosError::Config(
                "station.station_id must be set".to_string(),
            ));
        }
        if self.station.polling_interval_seconds == 0 {
            return Err(crate::GiosError::Config(
                "station.polling_interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.station.name.trim().is_empty() {
            return Err(crate::GiosError::Config(
                "station.name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// The monitored station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub station_id: u32,
    #[serde(default = "default_station_name")]
    pub name: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_seconds: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            station_id: 0,
            name: default_station_name(),
            polling_interval_seconds: default_polling_interval(),
        }
    }
}

/// GIOŚ REST API access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Entity registry persistence. Without a path the registry lives in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
        }
    }
}

fn default_station_name() -> String {
    "Home".to_string()
}

fn default_polling_interval() -> u64 {
    30 * 60
}

fn default_base_url() -> String {
    "https://api.gios.gov.pl/pjp-api/rest".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11116
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::GiosError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
