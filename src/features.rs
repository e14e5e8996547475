// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Feature vector layout and wire format
//!
//! The remote model was trained on exactly this column order:
//!
//! | col | value                 |
//! |-----|-----------------------|
//! | 0-4 | temperature, voltage, current, cpu_usage, fan_speed (raw units) |
//! | 5-9 | state code of each of the same five sensors |
//!
//! Reordering columns silently corrupts predictions.

use crate::classifier::{SeverityState, ThresholdTable};
use crate::error::ParseError;
use crate::sensor::CompleteReading;
use std::fmt;

/// Number of columns sent to the classifier
pub const FEATURE_COUNT: usize = 10;

/// Raw sensor values followed by their state codes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    raw: [f64; 5],
    states: [SeverityState; 5],
}

impl FeatureVector {
    /// Build the vector for a complete reading
    pub fn build(reading: &CompleteReading, thresholds: &ThresholdTable) -> Self {
        Self {
            raw: reading.values(),
            states: thresholds.classify_reading(reading),
        }
    }

    /// Raw values (columns 0-4)
    pub fn raw_values(&self) -> [f64; 5] {
        self.raw
    }

    /// State labels (columns 5-9)
    pub fn states(&self) -> [SeverityState; 5] {
        self.states
    }

    /// All ten columns as numbers
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        out[..5].copy_from_slice(&self.raw);
        for (slot, state) in out[5..].iter_mut().zip(self.states) {
            *slot = f64::from(state.code());
        }
        out
    }

    /// Comma-joined wire form. Raw values keep a decimal point (`1.0`, not
    /// `1`), states are integer codes.
    pub fn to_csv(&self) -> String {
        let raw = self.raw.iter().map(|v| format!("{:?}", v));
        let states = self.states.iter().map(|s| s.code().to_string());
        raw.chain(states).collect::<Vec<_>>().join(",")
    }

    /// Recover the raw reading from the wire form. The state columns are
    /// checked for count only; they are derived, not carried.
    pub fn parse_raw(csv: &str) -> Result<CompleteReading, ParseError> {
        let fields: Vec<&str> = csv.trim().split(',').collect();
        if fields.len() != FEATURE_COUNT {
            return Err(ParseError::FieldCount {
                expected: FEATURE_COUNT,
                actual: fields.len(),
            });
        }

        let mut raw = [0.0; 5];
        for (position, (slot, token)) in raw.iter_mut().zip(&fields).enumerate() {
            *slot = token
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidNumber {
                    position,
                    token: token.to_string(),
                })?;
        }
        Ok(CompleteReading::from_values(raw))
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv())
    }
}
