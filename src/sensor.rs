// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor names and readings
//!
//! A [`SensorReading`] is whatever a device line yielded and may have
//! empty slots. Only a [`CompleteReading`] is accepted downstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five monitored sensors, in feature-vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    /// Board temperature (C)
    Temperature,
    /// Supply voltage (V)
    Voltage,
    /// Supply current (A)
    Current,
    /// CPU usage (%)
    CpuUsage,
    /// Fan speed (RPM)
    FanSpeed,
}

impl Sensor {
    /// All sensors in feature-vector order
    pub const ALL: [Sensor; 5] = [
        Sensor::Temperature,
        Sensor::Voltage,
        Sensor::Current,
        Sensor::CpuUsage,
        Sensor::FanSpeed,
    ];

    /// Position in the feature vector
    pub fn index(self) -> usize {
        match self {
            Sensor::Temperature => 0,
            Sensor::Voltage => 1,
            Sensor::Current => 2,
            Sensor::CpuUsage => 3,
            Sensor::FanSpeed => 4,
        }
    }

    /// Canonical snake_case name
    pub fn name(self) -> &'static str {
        match self {
            Sensor::Temperature => "temperature",
            Sensor::Voltage => "voltage",
            Sensor::Current => "current",
            Sensor::CpuUsage => "cpu_usage",
            Sensor::FanSpeed => "fan_speed",
        }
    }

    /// Title-cased name for display ("Cpu Usage")
    pub fn display_name(self) -> &'static str {
        match self {
            Sensor::Temperature => "Temperature",
            Sensor::Voltage => "Voltage",
            Sensor::Current => "Current",
            Sensor::CpuUsage => "Cpu Usage",
            Sensor::FanSpeed => "Fan Speed",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sensor::ALL
            .iter()
            .copied()
            .find(|sensor| sensor.name() == s.trim())
            .ok_or_else(|| format!("unknown sensor: {}", s))
    }
}

/// A possibly partial snapshot of the five sensors
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReading {
    slots: [Option<f64>; 5],
}

impl SensorReading {
    /// Create an empty reading
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `sensor` set to `value`
    pub fn with(mut self, sensor: Sensor, value: f64) -> Self {
        self.slots[sensor.index()] = Some(value);
        self
    }

    /// Get a sensor value
    pub fn get(&self, sensor: Sensor) -> Option<f64> {
        self.slots[sensor.index()]
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if no slot is populated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if all five slots are populated
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Sensors with no value, in feature-vector order
    pub fn missing(&self) -> Vec<Sensor> {
        Sensor::ALL
            .iter()
            .copied()
            .filter(|s| self.get(*s).is_none())
            .collect()
    }

    /// Iterate over populated slots in feature-vector order
    pub fn iter(&self) -> impl Iterator<Item = (Sensor, f64)> + '_ {
        Sensor::ALL
            .iter()
            .filter_map(move |s| self.get(*s).map(|v| (*s, v)))
    }

    /// Convert to a complete reading, if every slot is populated
    pub fn to_complete(&self) -> Option<CompleteReading> {
        Some(CompleteReading {
            temperature: self.get(Sensor::Temperature)?,
            voltage: self.get(Sensor::Voltage)?,
            current: self.get(Sensor::Current)?,
            cpu_usage: self.get(Sensor::CpuUsage)?,
            fan_speed: self.get(Sensor::FanSpeed)?,
        })
    }
}

impl From<CompleteReading> for SensorReading {
    fn from(reading: CompleteReading) -> Self {
        let mut out = SensorReading::new();
        for (sensor, value) in Sensor::ALL.iter().zip(reading.values()) {
            out = out.with(*sensor, value);
        }
        out
    }
}

/// A reading with all five sensors present
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompleteReading {
    pub temperature: f64,
    pub voltage: f64,
    pub current: f64,
    pub cpu_usage: f64,
    pub fan_speed: f64,
}

impl CompleteReading {
    /// Build from values in feature-vector order
    pub fn from_values(values: [f64; 5]) -> Self {
        Self {
            temperature: values[0],
            voltage: values[1],
            current: values[2],
            cpu_usage: values[3],
            fan_speed: values[4],
        }
    }

    /// Get a sensor value
    pub fn get(&self, sensor: Sensor) -> f64 {
        match sensor {
            Sensor::Temperature => self.temperature,
            Sensor::Voltage => self.voltage,
            Sensor::Current => self.current,
            Sensor::CpuUsage => self.cpu_usage,
            Sensor::FanSpeed => self.fan_speed,
        }
    }

    /// Values in feature-vector order
    pub fn values(&self) -> [f64; 5] {
        [
            self.temperature,
            self.voltage,
            self.current,
            self.cpu_usage,
            self.fan_speed,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_names() {
        assert_eq!(Sensor::CpuUsage.name(), "cpu_usage");
        assert_eq!(Sensor::CpuUsage.display_name(), "Cpu Usage");
        assert_eq!("fan_speed".parse::<Sensor>().unwrap(), Sensor::FanSpeed);
        assert!("humidity".parse::<Sensor>().is_err());
    }

    #[test]
    fn test_sensor_order_matches_index() {
        for (i, sensor) in Sensor::ALL.iter().enumerate() {
            assert_eq!(sensor.index(), i);
        }
    }

    #[test]
    fn test_partial_reading() {
        let reading = SensorReading::new()
            .with(Sensor::Temperature, 40.0)
            .with(Sensor::FanSpeed, 1800.0);

        assert_eq!(reading.len(), 2);
        assert!(!reading.is_complete());
        assert!(reading.to_complete().is_none());
        assert_eq!(
            reading.missing(),
            vec![Sensor::Voltage, Sensor::Current, Sensor::CpuUsage]
        );
    }

    #[test]
    fn test_complete_reading_conversion() {
        let complete = CompleteReading::from_values([50.0, 3.3, 1.2, 20.0, 1500.0]);
        let reading = SensorReading::from(complete);
        assert!(reading.is_complete());
        assert_eq!(reading.to_complete(), Some(complete));
        assert_eq!(complete.get(Sensor::Current), 1.2);
    }

    #[test]
    fn test_complete_reading_serializes_with_sensor_names() {
        let complete = CompleteReading::from_values([50.0, 3.3, 1.2, 20.0, 1500.0]);
        let json = serde_json::to_string(&complete).unwrap();
        assert!(json.contains("\"cpu_usage\":20.0"));
        assert!(json.contains("\"fan_speed\":1500.0"));
    }
}
