// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Rule-based state classification
//!
//! Each sensor has a static table of two closed intervals, "normal" and
//! "warning". A value inside the normal band is Normal, otherwise inside the
//! warning band is Warning, otherwise Critical. Both bounds are inclusive and
//! the normal band is checked first, so a shared boundary belongs to Normal.
//!
//! The voltage warning band lies *below* the normal band (brown-out), unlike
//! every other sensor.

use crate::sensor::{CompleteReading, Sensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal severity of a sensor value or of a predicted system state
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum SeverityState {
    /// Within normal operating range
    #[default]
    Normal = 0,
    /// Degraded
    Warning = 1,
    /// Outside both bands
    Critical = 2,
}

impl SeverityState {
    /// All states in class order
    pub const ALL: [SeverityState; 3] = [
        SeverityState::Normal,
        SeverityState::Warning,
        SeverityState::Critical,
    ];

    /// Numeric code as sent to the classifier
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SeverityState::Normal),
            1 => Some(SeverityState::Warning),
            2 => Some(SeverityState::Critical),
            _ => None,
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            SeverityState::Normal => "Normal",
            SeverityState::Warning => "Warning",
            SeverityState::Critical => "Critical",
        }
    }

    /// Dashboard colour for this state
    pub fn color(self) -> &'static str {
        match self {
            SeverityState::Normal => "green",
            SeverityState::Warning => "orange",
            SeverityState::Critical => "red",
        }
    }
}

impl fmt::Display for SeverityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SeverityState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeverityState::ALL
            .iter()
            .copied()
            .find(|state| state.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown state: {}", s))
    }
}

/// A closed interval `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    /// Create a new band
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Inclusive containment. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Where the dashboard draws reference lines for a sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertLevels {
    /// Boundary between normal and warning
    pub warning_at: f64,
    /// Boundary between warning and critical
    pub critical_at: f64,
}

/// Normal and warning bands of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorThresholds {
    pub normal: Band,
    pub warning: Band,
}

impl SensorThresholds {
    /// Create thresholds from two bands
    pub const fn new(normal: Band, warning: Band) -> Self {
        Self { normal, warning }
    }

    /// Classify a value against these bands
    pub fn classify(&self, value: f64) -> SeverityState {
        if self.normal.contains(value) {
            SeverityState::Normal
        } else if self.warning.contains(value) {
            SeverityState::Warning
        } else {
            SeverityState::Critical
        }
    }

    /// Check if the warning band sits below the normal band
    pub fn is_inverted(&self) -> bool {
        self.warning.high <= self.normal.low
    }

    /// Reference line positions
    pub fn alert_levels(&self) -> AlertLevels {
        if self.is_inverted() {
            AlertLevels {
                warning_at: self.warning.high,
                critical_at: self.warning.low,
            }
        } else {
            AlertLevels {
                warning_at: self.warning.low,
                critical_at: self.warning.high,
            }
        }
    }
}

/// Per-sensor threshold table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    entries: [SensorThresholds; 5],
}

const DEFAULT_THRESHOLDS: [SensorThresholds; 5] = [
    // temperature (C)
    SensorThresholds::new(Band::new(0.0, 70.0), Band::new(70.0, 85.0)),
    // voltage (V)
    SensorThresholds::new(Band::new(3.0, 3.6), Band::new(2.7, 3.0)),
    // current (A)
    SensorThresholds::new(Band::new(0.0, 2.0), Band::new(2.0, 2.5)),
    // cpu_usage (%)
    SensorThresholds::new(Band::new(0.0, 70.0), Band::new(70.0, 85.0)),
    // fan_speed (RPM)
    SensorThresholds::new(Band::new(1000.0, 2500.0), Band::new(2500.0, 3000.0)),
];

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_THRESHOLDS,
        }
    }
}

impl ThresholdTable {
    /// Create a table with the board's default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Get thresholds for a sensor
    pub fn get(&self, sensor: Sensor) -> &SensorThresholds {
        &self.entries[sensor.index()]
    }

    /// Replace thresholds for a sensor
    pub fn set(&mut self, sensor: Sensor, thresholds: SensorThresholds) {
        self.entries[sensor.index()] = thresholds;
    }

    /// Classify one sensor value
    pub fn classify(&self, sensor: Sensor, value: f64) -> SeverityState {
        self.get(sensor).classify(value)
    }

    /// Classify all five sensors, in feature-vector order
    pub fn classify_reading(&self, reading: &CompleteReading) -> [SeverityState; 5] {
        Sensor::ALL.map(|sensor| self.classify(sensor, reading.get(sensor)))
    }
}

/// Classify with the default table
pub fn classify(sensor: Sensor, value: f64) -> SeverityState {
    DEFAULT_THRESHOLDS[sensor.index()].classify(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage_inverted_band() {
        assert_eq!(classify(Sensor::Voltage, 3.6), SeverityState::Normal);
        assert_eq!(classify(Sensor::Voltage, 3.0), SeverityState::Normal);
        assert_eq!(classify(Sensor::Voltage, 2.8), SeverityState::Warning);
        assert_eq!(classify(Sensor::Voltage, 2.7), SeverityState::Warning);
        assert_eq!(classify(Sensor::Voltage, 1.0), SeverityState::Critical);
        // Over-voltage is critical: no warning band above normal
        assert_eq!(classify(Sensor::Voltage, 3.7), SeverityState::Critical);
    }

    #[test]
    fn test_shared_boundary_is_normal() {
        assert_eq!(classify(Sensor::Temperature, 70.0), SeverityState::Normal);
        assert_eq!(classify(Sensor::Temperature, 70.0000001), SeverityState::Warning);
        assert_eq!(classify(Sensor::Temperature, 85.0), SeverityState::Warning);
        assert_eq!(classify(Sensor::Temperature, 85.01), SeverityState::Critical);
    }

    #[test]
    fn test_each_sensor_bands() {
        assert_eq!(classify(Sensor::Current, 2.2), SeverityState::Warning);
        assert_eq!(classify(Sensor::Current, 3.0), SeverityState::Critical);
        assert_eq!(classify(Sensor::CpuUsage, 84.0), SeverityState::Warning);
        assert_eq!(classify(Sensor::CpuUsage, 99.0), SeverityState::Critical);
        assert_eq!(classify(Sensor::FanSpeed, 999.0), SeverityState::Critical);
        assert_eq!(classify(Sensor::FanSpeed, 2800.0), SeverityState::Warning);
    }

    #[test]
    fn test_negative_and_nan_are_critical() {
        assert_eq!(classify(Sensor::Temperature, -5.0), SeverityState::Critical);
        assert_eq!(classify(Sensor::CpuUsage, f64::NAN), SeverityState::Critical);
    }

    #[test]
    fn test_table_matches_free_function() {
        let table = ThresholdTable::default();
        for sensor in Sensor::ALL {
            for value in [0.0, 2.5, 3.1, 71.0, 2600.0] {
                assert_eq!(table.classify(sensor, value), classify(sensor, value));
            }
        }
    }

    #[test]
    fn test_classify_reading() {
        let reading = CompleteReading::from_values([90.0, 3.2, 1.0, 50.0, 2000.0]);
        let states = ThresholdTable::default().classify_reading(&reading);
        assert_eq!(
            states,
            [
                SeverityState::Critical,
                SeverityState::Normal,
                SeverityState::Normal,
                SeverityState::Normal,
                SeverityState::Normal
            ]
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let mut table = ThresholdTable::default();
        table.set(
            Sensor::Temperature,
            SensorThresholds::new(Band::new(0.0, 50.0), Band::new(50.0, 60.0)),
        );
        assert_eq!(table.classify(Sensor::Temperature, 55.0), SeverityState::Warning);
        assert_eq!(classify(Sensor::Temperature, 55.0), SeverityState::Normal);
    }

    #[test]
    fn test_alert_levels() {
        let table = ThresholdTable::default();
        let voltage = table.get(Sensor::Voltage).alert_levels();
        assert_eq!(voltage.warning_at, 3.0);
        assert_eq!(voltage.critical_at, 2.7);

        let fan = table.get(Sensor::FanSpeed).alert_levels();
        assert_eq!(fan.warning_at, 2500.0);
        assert_eq!(fan.critical_at, 3000.0);
    }

    #[test]
    fn test_state_codes_and_names() {
        assert_eq!(SeverityState::Critical.code(), 2);
        assert_eq!(SeverityState::from_code(1), Some(SeverityState::Warning));
        assert_eq!(SeverityState::from_code(3), None);
        assert_eq!("warning".parse::<SeverityState>().unwrap(), SeverityState::Warning);
        assert!(SeverityState::Normal < SeverityState::Critical);
    }
}
