// CPUMon Testdata - Synthetic sensor data
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # CPUMon Testdata
//!
//! Synthetic data for exercising the CPUMon pipeline without hardware:
//!
//! - **Training sets**: labelled CPU sensor samples, split and written as CSV
//! - **Simulated board**: a [`cpumon::Device`] emitting board-format lines
//! - **Machine readings**: random inputs for the failure endpoint
//!
//! ## Quick Start
//!
//! ```rust
//! use cpumon::Device;
//! use cpumon_testdata::{SimulatedBoard, SimulatedDevice};
//!
//! let mut device = SimulatedDevice::new(SimulatedBoard::new().with_seed(42));
//! let line = device.read_line().unwrap();
//! assert!(cpumon::parse_line(&line).is_complete());
//! ```

pub mod device;
pub mod machine;
pub mod training;

// Re-exports for convenience
pub use device::{format_line, SimulatedBoard, SimulatedConnector, SimulatedDevice, Walk};
pub use machine::MachineGenerator;
pub use training::{
    generate_training_set, write_training_files, SensorLabels, TrainingConfig, TrainingError,
    TrainingSample, TrainingSet, TrainingSummary, TRAINING_CSV_HEADER,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
