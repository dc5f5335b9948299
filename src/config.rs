use crate::device::HeatPumpModel;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// The only gateway transport the bridge knows how to drive.
pub const CONNECTION_TYPE_NIBEGW: &str = "nibegw";

/// Default coil read attempts before a cycle is failed.
pub const COIL_READ_RETRIES: u32 = 5;

/// Load `KEY=value` pairs from a `.env` file in the working directory.
///
/// Values may contain spaces and may be wrapped in single or double quotes.
/// Variables already present in the environment are left alone.
pub fn load_dotenv() {
    let Ok(content) = fs::read_to_string(".env") else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(&key).is_err() {
            // SAFETY: called once at startup, before any task is spawned or reads
            // the environment
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), unquoted.to_string())
        })
        .collect()
}

/// Default location of the JSON config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("heatpump-bridge").join("config.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub coordinator: CoordinatorConfig,
}

/// Connection settings for the heat pump gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub connection_type: String,
    pub ip_address: String,
    pub remote_read_port: u16,
    pub remote_write_port: u16,
    pub listening_port: u16,
    pub word_swap: bool,
    pub model: HeatPumpModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub name: String,
    /// Stable id of this installation; entity unique ids derive from it
    pub unique_id: String,
    pub update_interval_secs: u64,
    pub read_retries: u32,
}

impl CoordinatorConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connection_type: CONNECTION_TYPE_NIBEGW.to_string(),
            ip_address: "192.168.1.50".to_string(),
            remote_read_port: 9999,
            remote_write_port: 10000,
            listening_port: 9999,
            word_swap: true,
            model: HeatPumpModel::F1255,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "Nibe Heat Pump".to_string(),
            unique_id: "nibe-heatpump".to_string(),
            update_interval_secs: 60,
            read_retries: COIL_READ_RETRIES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variables on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(connection_type) = std::env::var("NIBE_CONNECTION_TYPE") {
            self.gateway.connection_type = connection_type;
        }
        if let Ok(ip) = std::env::var("NIBE_IP_ADDRESS") {
            self.gateway.ip_address = ip;
        }
        if let Some(port) = env_parse("NIBE_REMOTE_READ_PORT") {
            self.gateway.remote_read_port = port;
        }
        if let Some(port) = env_parse("NIBE_REMOTE_WRITE_PORT") {
            self.gateway.remote_write_port = port;
        }
        if let Some(port) = env_parse("NIBE_LISTENING_PORT") {
            self.gateway.listening_port = port;
        }
        if let Some(word_swap) = env_parse("NIBE_WORD_SWAP") {
            self.gateway.word_swap = word_swap;
        }
        if let Some(model) = env_parse("NIBE_MODEL") {
            self.gateway.model = model;
        }

        if let Ok(unique_id) = std::env::var("NIBE_UNIQUE_ID") {
            self.coordinator.unique_id = unique_id;
        }
        if let Some(secs) = env_parse("NIBE_UPDATE_INTERVAL") {
            self.coordinator.update_interval_secs = secs;
        }
        if let Some(retries) = env_parse("NIBE_READ_RETRIES") {
            self.coordinator.read_retries = retries;
        }

        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.connection_type != CONNECTION_TYPE_NIBEGW {
            return Err(BridgeError::UnsupportedConnection(
                self.gateway.connection_type.clone(),
            ));
        }
        if self.gateway.remote_read_port == self.gateway.remote_write_port {
            return Err(BridgeError::Config(
                "remote read and write ports must differ".to_string(),
            ));
        }
        if self.gateway.listening_port == 0 {
            return Err(BridgeError::Config(
                "listening port must be non-zero".to_string(),
            ));
        }
        if self.coordinator.update_interval_secs == 0 {
            return Err(BridgeError::Config(
                "update interval must be at least one second".to_string(),
            ));
        }
        if self.coordinator.read_retries == 0 {
            return Err(BridgeError::Config(
                "read retries must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coordinator.read_retries, 5);
        assert_eq!(config.coordinator.update_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_unsupported_connection_type() {
        let mut config = Config::default();
        config.gateway.connection_type = "modbus".to_string();
        match config.validate() {
            Err(BridgeError::UnsupportedConnection(kind)) => assert_eq!(kind, "modbus"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_same_read_write_port_rejected() {
        let mut config = Config::default();
        config.gateway.remote_write_port = config.gateway.remote_read_port;
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"gateway": {"ip_address": "10.0.0.7", "model": "SMO40"},
                "coordinator": {"update_interval_secs": 30}}"#,
        )
        .unwrap();
        assert_eq!(config.gateway.ip_address, "10.0.0.7");
        assert_eq!(config.gateway.model, HeatPumpModel::SMO40);
        assert_eq!(config.gateway.remote_read_port, 9999);
        assert_eq!(config.coordinator.update_interval_secs, 30);
        assert_eq!(config.coordinator.read_retries, 5);
    }

    #[test]
    fn test_parse_dotenv() {
        let parsed = parse_dotenv(
            "# comment\n\nNIBE_IP_ADDRESS = 10.0.0.9\nNAME=\"Heat pump cellar\"\nQUOTED='x y'\nbroken line\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("NIBE_IP_ADDRESS".to_string(), "10.0.0.9".to_string()),
                ("NAME".to_string(), "Heat pump cellar".to_string()),
                ("QUOTED".to_string(), "x y".to_string()),
            ]
        );
    }
}
