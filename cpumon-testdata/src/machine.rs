// CPUMon Testdata - Fake machine readings
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Random milling machine readings for the failure endpoint.

use cpumon::{MachineReading, MachineType};
use rand::prelude::*;
use rand::rngs::StdRng;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Draws machine readings.
#[derive(Debug)]
pub struct MachineGenerator {
    rng: StdRng,
}

impl Default for MachineGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MachineGenerator {
    /// Create a generator, optionally seeded.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Draw one reading.
    pub fn next_reading(&mut self) -> MachineReading {
        MachineReading {
            air_temp_k: round2(self.rng.gen_range(290.0..=310.0)),
            process_temp_k: round2(self.rng.gen_range(300.0..=320.0)),
            rotational_speed_rpm: self.rng.gen_range(1200..=1600),
            torque_nm: round2(self.rng.gen_range(20.0..=50.0)),
            tool_wear_min: self.rng.gen_range(0..=250),
            machine_type: MachineType::ALL
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(MachineType::M),
        }
    }
}

impl Iterator for MachineGenerator {
    type Item = MachineReading;

    fn next(&mut self) -> Option<MachineReading> {
        Some(self.next_reading())
    }
}
