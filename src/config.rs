// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Monitor configuration.

use crate::error::ConfigError;
use crate::latency::NetworkTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where device lines come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceSource {
    /// File or character device (serial tty)
    File { path: PathBuf },
    /// Serial-over-TCP bridge
    Tcp { addr: String },
    /// Built-in random line generator
    Simulated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
}

impl Default for DeviceSource {
    fn default() -> Self {
        DeviceSource::File {
            path: PathBuf::from("/dev/ttyACM0"),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// CPU state endpoint URL
    pub endpoint_url: String,
    /// Overall inference request timeout in milliseconds (None = transport default)
    pub request_timeout_ms: Option<u64>,
    /// Device source
    pub device: DeviceSource,
    /// Device read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Selectable network tags
    pub networks: Vec<NetworkTag>,
    /// Tag active at session start
    pub default_network: NetworkTag,
    /// Machine failure endpoint URL
    pub maintenance_url: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8080/invocations".to_string(),
            request_timeout_ms: None,
            device: DeviceSource::default(),
            read_timeout_ms: 1000,
            networks: vec![NetworkTag::new("4G"), NetworkTag::new("5G")],
            default_network: NetworkTag::new("4G"),
            maintenance_url: "http://localhost:8000/predict".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing keys take default values
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the inference endpoint
    pub fn with_endpoint(mut self, url: &str) -> Self {
        self.endpoint_url = url.to_string();
        self
    }

    /// Set the device source
    pub fn with_device(mut self, device: DeviceSource) -> Self {
        self.device = device;
        self
    }

    /// Set the selectable networks and the initial one
    pub fn with_networks(mut self, networks: Vec<NetworkTag>, default: NetworkTag) -> Self {
        self.networks = networks;
        self.default_network = default;
        self
    }

    /// Set the maintenance endpoint
    pub fn with_maintenance_url(mut self, url: &str) -> Self {
        self.maintenance_url = url.to_string();
        self
    }

    /// Device read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Inference request timeout
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint_url is empty".to_string()));
        }
        if self.networks.is_empty() {
            return Err(ConfigError::Invalid("no networks configured".to_string()));
        }
        if !self.networks.contains(&self.default_network) {
            return Err(ConfigError::Invalid(format!(
                "default network {} is not in {:?}",
                self.default_network,
                self.networks.iter().map(NetworkTag::as_str).collect::<Vec<_>>()
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_default_network_must_be_listed() {
        let config = MonitorConfig::default()
            .with_networks(vec![NetworkTag::new("4G")], NetworkTag::new("5G"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"endpoint_url": "http://10.0.0.5/invocations", "device": {{"kind": "tcp", "addr": "10.0.0.9:4000"}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = MonitorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.endpoint_url, "http://10.0.0.5/invocations");
        assert_eq!(
            config.device,
            DeviceSource::Tcp {
                addr: "10.0.0.9:4000".to_string()
            }
        );
        assert_eq!(config.default_network, NetworkTag::new("4G"));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            MonitorConfig::from_json_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_simulated_source_roundtrip() {
        let source = DeviceSource::Simulated { seed: Some(7) };
        let json = serde_json::to_string(&source).unwrap();
        assert_eq!(json, r#"{"kind":"simulated","seed":7}"#);
        let back: DeviceSource = serde_json::from_str(r#"{"kind":"simulated"}"#).unwrap();
        assert_eq!(back, DeviceSource::Simulated { seed: None });
    }
}
