// CPUMon Testdata - Simulated sensor board
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! A [`Device`] that emits sensor-board lines without hardware.
//!
//! Each sensor follows a bounded random walk. Lines use the board's
//! format, e.g.
//!
//! ```text
//! Temperature: 45.20 C | Voltage: 3.30 V | Current: 1.20 A | CPU Usage: 35.0 % | Fan Speed: 1800 RPM
//! ```

use cpumon::{Device, DeviceConnector, DeviceError, Sensor};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

/// Random walk parameters for one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walk {
    /// Starting value.
    pub start: f64,
    /// Standard deviation of one step.
    pub step_std: f64,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Walk {
    pub const fn new(start: f64, step_std: f64, min: f64, max: f64) -> Self {
        Self {
            start,
            step_std,
            min,
            max,
        }
    }
}

/// Board simulation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedBoard {
    /// Walks in [`Sensor::ALL`] order.
    pub walks: [Walk; 5],
    /// Probability that a line omits one field.
    pub dropout_rate: f64,
    /// Random seed.
    pub seed: Option<u64>,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self {
            walks: [
                Walk::new(45.0, 1.5, 20.0, 100.0),
                Walk::new(3.3, 0.05, 2.8, 3.8),
                Walk::new(1.2, 0.1, 0.0, 3.0),
                Walk::new(35.0, 5.0, 0.0, 100.0),
                Walk::new(1800.0, 60.0, 500.0, 3000.0),
            ],
            dropout_rate: 0.0,
            seed: None,
        }
    }
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the incomplete-line probability.
    pub fn with_dropout_rate(mut self, rate: f64) -> Self {
        self.dropout_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Override one sensor's walk.
    pub fn with_walk(mut self, sensor: Sensor, walk: Walk) -> Self {
        self.walks[sensor.index()] = walk;
        self
    }
}

/// Render one board line, skipping sensors whose value is `None`.
pub fn format_line(values: [Option<f64>; 5]) -> String {
    Sensor::ALL
        .iter()
        .zip(values)
        .filter_map(|(sensor, value)| {
            let v = value?;
            Some(match sensor {
                Sensor::Temperature => format!("Temperature: {:.2} C", v),
                Sensor::Voltage => format!("Voltage: {:.2} V", v),
                Sensor::Current => format!("Current: {:.2} A", v),
                Sensor::CpuUsage => format!("CPU Usage: {:.1} %", v),
                Sensor::FanSpeed => format!("Fan Speed: {:.0} RPM", v),
            })
        })
        .collect::<Vec<_>>()
        .join(cpumon::FIELD_DELIMITER)
}

/// Simulated sensor board.
#[derive(Debug)]
pub struct SimulatedDevice {
    board: SimulatedBoard,
    values: [f64; 5],
    rng: StdRng,
    is_open: bool,
}

impl SimulatedDevice {
    /// Create a device at the walks' start values.
    pub fn new(board: SimulatedBoard) -> Self {
        let rng = match board.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let values = board.walks.map(|w| w.start);
        Self {
            board,
            values,
            rng,
            is_open: true,
        }
    }

    /// Current values in [`Sensor::ALL`] order.
    pub fn values(&self) -> [f64; 5] {
        self.values
    }

    fn step(&mut self) {
        for (value, walk) in self.values.iter_mut().zip(&self.board.walks) {
            if walk.step_std > 0.0 {
                if let Ok(dist) = Normal::new(0.0, walk.step_std) {
                    *value += dist.sample(&mut self.rng);
                }
            }
            *value = value.clamp(walk.min, walk.max);
        }
    }

    /// Advance the walks and render the next line.
    pub fn next_line(&mut self) -> String {
        self.step();
        let mut fields = self.values.map(Some);
        if self.board.dropout_rate > 0.0 && self.rng.gen_bool(self.board.dropout_rate) {
            let dropped = self.rng.gen_range(0..fields.len());
            fields[dropped] = None;
        }
        format_line(fields)
    }
}

impl Device for SimulatedDevice {
    fn read_line(&mut self) -> Result<String, DeviceError> {
        if !self.is_open {
            return Err(DeviceError::NotConnected);
        }
        Ok(self.next_line())
    }

    fn close(&mut self) {
        self.is_open = false;
    }
}

/// Opens a fresh [`SimulatedDevice`] on every connect.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    board: SimulatedBoard,
}

impl SimulatedConnector {
    pub fn new(board: SimulatedBoard) -> Self {
        Self { board }
    }
}

impl DeviceConnector for SimulatedConnector {
    fn connect(&self) -> Result<Box<dyn Device>, DeviceError> {
        Ok(Box::new(SimulatedDevice::new(self.board.clone())))
    }

    fn describe(&self) -> String {
        match self.board.seed {
            Some(seed) => format!("simulated (seed {})", seed),
            None => String::from("simulated"),
        }
    }
}
