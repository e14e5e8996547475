// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Session context
//!
//! A [`Session`] owns everything one operator session needs: the device
//! handle, the inference client with its latency log, the selected network
//! tag and the prediction history. Each [`Session::run_cycle`] runs
//! read → label → build → predict → record to completion before returning.
//!
//! Failure policy:
//! - device failure: the handle is dropped and an explicit
//!   [`Session::connect`] is required before the next cycle
//! - incomplete reading: the cycle is skipped, nothing is sent
//! - inference failure: the cycle aborts and no history entry is written

use crate::classifier::ThresholdTable;
use crate::config::MonitorConfig;
use crate::device::{Device, DeviceConnector};
use crate::error::{DeviceError, Result, SessionError};
use crate::features::FeatureVector;
use crate::history::{HistoryEntry, HistoryStore};
use crate::inference::{InferenceBackend, InferenceClient};
use crate::latency::{LatencyLog, NetworkTag};
use crate::parser::ReadingParser;
use crate::sensor::{Sensor, SensorReading};
use chrono::Utc;
use log::{debug, info, warn};

/// Result of one read-and-predict cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Prediction obtained and recorded
    Predicted(HistoryEntry),
    /// The reading lacked sensors; nothing was sent
    Skipped {
        reading: SensorReading,
        missing: Vec<Sensor>,
    },
}

/// One operator session
pub struct Session {
    config: MonitorConfig,
    connector: Box<dyn DeviceConnector>,
    device: Option<Box<dyn Device>>,
    parser: ReadingParser,
    thresholds: ThresholdTable,
    client: InferenceClient,
    network: NetworkTag,
    history: HistoryStore,
}

impl Session {
    /// Create a disconnected session
    pub fn new(
        config: MonitorConfig,
        connector: Box<dyn DeviceConnector>,
        backend: Box<dyn InferenceBackend>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            network: config.default_network.clone(),
            config,
            connector,
            device: None,
            parser: ReadingParser::default(),
            thresholds: ThresholdTable::default(),
            client: InferenceClient::new(backend),
            history: HistoryStore::new(),
        })
    }

    /// Create a session posting to the configured HTTP endpoint
    #[cfg(feature = "http")]
    pub fn with_http(config: MonitorConfig, connector: Box<dyn DeviceConnector>) -> Result<Self> {
        let backend = crate::inference::HttpBackend::new(
            config.endpoint_url.clone(),
            config.request_timeout(),
        );
        Self::new(config, connector, Box::new(backend))
    }

    /// Replace the label parser
    pub fn with_parser(mut self, parser: ReadingParser) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the threshold table
    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Open the device. Already connected is not an error.
    pub fn connect(&mut self) -> std::result::Result<(), DeviceError> {
        if self.device.is_some() {
            return Ok(());
        }
        match self.connector.connect() {
            Ok(device) => {
                info!("Connected to {}", self.connector.describe());
                self.device = Some(device);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", self.connector.describe(), e);
                Err(e)
            }
        }
    }

    /// Close the device, if open
    pub fn disconnect(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
            info!("Disconnected from {}", self.connector.describe());
        }
    }

    /// Check if a device handle is open
    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    /// Select the network tag for subsequent latency records
    pub fn set_network(&mut self, network: NetworkTag) -> Result<()> {
        if !self.config.networks.contains(&network) {
            return Err(SessionError::UnknownNetwork(network.to_string()));
        }
        debug!("Network type set to {}", network);
        self.network = network;
        Ok(())
    }

    /// Active network tag
    pub fn network(&self) -> &NetworkTag {
        &self.network
    }

    /// Read and parse one line. A failed read drops the handle.
    pub fn read_reading(&mut self) -> std::result::Result<SensorReading, DeviceError> {
        let device = self.device.as_mut().ok_or(DeviceError::NotConnected)?;

        match device.read_line() {
            Ok(line) => {
                debug!("Device line: {:?}", line);
                Ok(self.parser.parse(&line))
            }
            Err(e) => {
                warn!("Device read failed, dropping handle: {}", e);
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Run one read → predict → record cycle
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let reading = self.read_reading()?;

        let Some(complete) = reading.to_complete() else {
            let missing = reading.missing();
            warn!("Incomplete reading, missing {:?}; skipping cycle", missing);
            return Ok(CycleOutcome::Skipped { reading, missing });
        };

        let features = FeatureVector::build(&complete, &self.thresholds);
        let prediction = self.client.predict(&features, &self.network)?;

        let entry = HistoryEntry {
            timestamp: Utc::now(),
            reading: complete,
            endpoint_input: features.to_csv(),
            prediction,
        };
        self.history.append(entry.clone());
        Ok(CycleOutcome::Predicted(entry))
    }

    /// Prediction history
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Latency history
    pub fn latency_log(&self) -> &LatencyLog {
        self.client.latency_log()
    }

    /// Threshold table in use
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Session configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Device target description
    pub fn device_target(&self) -> String {
        self.connector.describe()
    }

    /// Inference endpoint description
    pub fn endpoint(&self) -> String {
        self.client.endpoint()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;
    use crate::error::InferenceError;

    struct ConstBackend;

    impl InferenceBackend for ConstBackend {
        fn invoke(&self, _content_type: &str, _body: &str) -> std::result::Result<String, InferenceError> {
            Ok("0.7,0.2,0.1".to_string())
        }
    }

    fn session(lines: &'static [&'static str]) -> Session {
        let connector = move || -> std::result::Result<Box<dyn Device>, DeviceError> {
            Ok(Box::new(MemoryDevice::new(lines.iter().copied())))
        };
        Session::new(MonitorConfig::default(), Box::new(connector), Box::new(ConstBackend)).unwrap()
    }

    #[test]
    fn test_read_requires_connection() {
        let mut s = session(&["Voltage: 3.3 V"]);
        assert!(!s.is_connected());
        assert_eq!(s.read_reading().unwrap_err(), DeviceError::NotConnected);

        s.connect().unwrap();
        assert!(s.is_connected());
        assert_eq!(s.read_reading().unwrap().len(), 1);
    }

    #[test]
    fn test_connect_twice_keeps_handle() {
        let mut s = session(&["Voltage: 3.3 V", "Voltage: 3.1 V"]);
        s.connect().unwrap();
        s.read_reading().unwrap();
        s.connect().unwrap();
        // Same handle: second line, not the first again
        assert_eq!(s.read_reading().unwrap().get(Sensor::Voltage), Some(3.1));
    }

    #[test]
    fn test_disconnect() {
        let mut s = session(&[]);
        s.connect().unwrap();
        s.disconnect();
        assert!(!s.is_connected());
        s.disconnect();
    }

    #[test]
    fn test_set_network() {
        let mut s = session(&[]);
        assert_eq!(s.network(), &NetworkTag::new("4G"));
        s.set_network(NetworkTag::new("5G")).unwrap();
        assert_eq!(s.network(), &NetworkTag::new("5G"));
        assert!(matches!(
            s.set_network(NetworkTag::new("3G")),
            Err(SessionError::UnknownNetwork(_))
        ));
        assert_eq!(s.network(), &NetworkTag::new("5G"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonitorConfig::default().with_endpoint("");
        let connector = || -> std::result::Result<Box<dyn Device>, DeviceError> {
            Err(DeviceError::NotConnected)
        };
        assert!(matches!(
            Session::new(config, Box::new(connector), Box::new(ConstBackend)),
            Err(SessionError::Config(_))
        ));
    }
}
