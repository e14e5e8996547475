//! # CPUMon - CPU state monitor
//!
//! Turns raw sensor lines from a serial-attached board into CPU state
//! predictions from a remote classifier, and keeps the session history
//! needed for reporting.
//!
//! ## Pipeline
//!
//! - **Parse**: one device line becomes a [`SensorReading`]
//! - **Label**: every sensor value gets a rule-based [`SeverityState`]
//! - **Build**: raw values plus labels form the 10-column [`FeatureVector`]
//! - **Predict**: the vector is posted to the inference endpoint
//! - **Record**: the outcome is appended to the [`HistoryStore`]
//!
//! ## Quick Start
//!
//! ```rust
//! use cpumon::{parse_line, FeatureVector, SeverityState, ThresholdTable};
//!
//! let line = "Temperature: 90 C | Voltage: 3.2 V | Current: 1.0 A | CPU Usage: 50 % | Fan Speed: 2000 RPM";
//! let reading = parse_line(line).to_complete().unwrap();
//!
//! let features = FeatureVector::build(&reading, &ThresholdTable::default());
//! assert_eq!(features.states()[0], SeverityState::Critical);
//! assert_eq!(features.to_csv(), "90.0,3.2,1.0,50.0,2000.0,2,0,0,0,0");
//! ```
//!
//! ## Modules
//!
//! - [`sensor`]: Sensor names and readings
//! - [`parser`]: Device line protocol
//! - [`classifier`]: Threshold tables and severity states
//! - [`features`]: Feature vector layout and wire format
//! - [`inference`]: Inference endpoint client
//! - [`latency`]: Latency records and per-network statistics
//! - [`history`]: Append-only prediction history
//! - [`export`]: CSV export
//! - [`device`]: Device handles and connectors
//! - [`session`]: Session context driving one read-and-predict cycle
//! - [`maintenance`]: Machine failure prediction client

// Modules
pub mod classifier;
pub mod config;
pub mod device;
pub mod error;
pub mod export;
pub mod features;
pub mod history;
pub mod inference;
pub mod latency;
pub mod maintenance;
pub mod parser;
pub mod sensor;
pub mod session;

// Re-exports for convenient access
pub use classifier::{classify, AlertLevels, Band, SensorThresholds, SeverityState, ThresholdTable};
pub use config::{DeviceSource, MonitorConfig};
pub use device::{
    Device, DeviceConnector, FileConnector, LineDevice, MemoryDevice, TcpConnector, TimedLineDevice,
};
pub use error::{
    ConfigError, DeviceError, ExportError, InferenceError, MaintenanceError, ParseError, Result,
    SessionError,
};
pub use export::{
    history_csv_string, latency_csv_string, write_history_csv, write_latency_csv,
    HISTORY_CSV_HEADER, LATENCY_CSV_HEADER,
};
pub use features::{FeatureVector, FEATURE_COUNT};
pub use history::{HistoryEntry, HistoryStore, HistoryView, SensorSeries};
pub use inference::{
    parse_probabilities, ClassProbabilities, InferenceBackend, InferenceClient, PredictionResult,
    CSV_CONTENT_TYPE, JSON_CONTENT_TYPE,
};
#[cfg(feature = "http")]
pub use inference::HttpBackend;
pub use latency::{LatencyLog, LatencyRecord, LatencySummary, NetworkTag};
pub use maintenance::{
    FailureOutcome, MachineReading, MachineType, MaintenanceClient, MaintenanceEntry,
    MaintenanceLog,
};
pub use parser::{parse_line, LabelRule, ReadingParser, FIELD_DELIMITER};
pub use sensor::{CompleteReading, Sensor, SensorReading};
pub use session::{CycleOutcome, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_line_to_feature_vector() {
        let line = "Temperature: 90 C | Voltage: 3.2 V | Current: 1.0 A | CPU Usage: 50 % | Fan Speed: 2000 RPM";
        let reading = parse_line(line);
        assert!(reading.is_complete());

        let complete = reading.to_complete().unwrap();
        let features = FeatureVector::build(&complete, &ThresholdTable::default());
        assert_eq!(
            features.as_array(),
            [90.0, 3.2, 1.0, 50.0, 2000.0, 2.0, 0.0, 0.0, 0.0, 0.0]
        );
    }
}
