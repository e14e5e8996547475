// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Device line protocol
//!
//! The board prints one line per reading:
//!
//! ```text
//! Temperature: 45.2 C | Voltage: 3.3 V | Current: 1.2 A | CPU Usage: 35 % | Fan Speed: 1800 RPM
//! ```
//!
//! Fields are split on [`FIELD_DELIMITER`], then at the first colon into a
//! label and a value. The label is matched by substring against an ordered
//! rule list; the value contributes its first whitespace-separated token.
//!
//! Matching rules:
//! - rules are tried in list order and the first rule whose needle occurs
//!   in the label wins for that field
//! - a later field that maps to the same sensor overwrites the earlier value
//! - fields without a colon, or whose token is not a number, are skipped
//!
//! A line with both "Board Temperature" and "CPU Temperature" therefore
//! keeps whichever comes last. Callers needing different priorities can
//! supply their own rule list.

use crate::sensor::{Sensor, SensorReading};
use log::debug;

/// Separator between fields of a device line
pub const FIELD_DELIMITER: &str = " | ";

/// Maps labels containing `needle` to `sensor`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRule {
    /// Lower-case substring searched for in the label
    pub needle: String,
    /// Slot populated on match
    pub sensor: Sensor,
}

impl LabelRule {
    /// Create a new rule
    pub fn new(needle: &str, sensor: Sensor) -> Self {
        Self {
            needle: needle.to_lowercase(),
            sensor,
        }
    }

    /// Check if the (already lower-cased) label matches
    pub fn matches(&self, label: &str) -> bool {
        label.contains(&self.needle)
    }
}

/// Parser for device lines
#[derive(Debug, Clone)]
pub struct ReadingParser {
    delimiter: String,
    rules: Vec<LabelRule>,
}

impl Default for ReadingParser {
    fn default() -> Self {
        Self {
            delimiter: FIELD_DELIMITER.to_string(),
            rules: Self::default_rules(),
        }
    }
}

impl ReadingParser {
    /// Create a parser with the default delimiter and rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with custom rules, tried in order
    pub fn with_rules(rules: Vec<LabelRule>) -> Self {
        Self {
            delimiter: FIELD_DELIMITER.to_string(),
            rules,
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = delimiter.to_string();
        self
    }

    /// The board firmware's labels, in match priority order.
    ///
    /// "cpu" also covers "cpu usage" and "fan" covers "fan speed".
    pub fn default_rules() -> Vec<LabelRule> {
        vec![
            LabelRule::new("temperature", Sensor::Temperature),
            LabelRule::new("voltage", Sensor::Voltage),
            LabelRule::new("current", Sensor::Current),
            LabelRule::new("cpu", Sensor::CpuUsage),
            LabelRule::new("fan", Sensor::FanSpeed),
        ]
    }

    /// Get the rules in priority order
    pub fn rules(&self) -> &[LabelRule] {
        &self.rules
    }

    /// Resolve a label to a sensor
    pub fn resolve(&self, label: &str) -> Option<Sensor> {
        let label = label.trim().to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&label))
            .map(|rule| rule.sensor)
    }

    /// Parse one line. Never fails; unusable fields leave slots empty.
    pub fn parse(&self, line: &str) -> SensorReading {
        let mut reading = SensorReading::new();

        for field in line.split(self.delimiter.as_str()) {
            let Some((label, value)) = field.split_once(':') else {
                continue;
            };

            let Some(value) = leading_number(value) else {
                debug!("Skipping field with non-numeric value: {:?}", field);
                continue;
            };

            match self.resolve(label) {
                Some(sensor) => reading = reading.with(sensor, value),
                None => debug!("Ignoring unknown label: {:?}", label.trim()),
            }
        }

        reading
    }
}

/// Parse a line with the default parser
pub fn parse_line(line: &str) -> SensorReading {
    ReadingParser::default().parse(line)
}

/// First whitespace-separated token as a number; units and trailing text are dropped.
fn leading_number(value: &str) -> Option<f64> {
    value.split_whitespace().next()?.parse().ok()
}
