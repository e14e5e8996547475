// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Machine failure prediction client
//!
//! A second, independent pipeline: a milling machine reading is posted as
//! JSON to a binary failure classifier.
//!
//! Request:
//!
//! ```json
//! {"air_temp_K": 300.1, "process_temp_K": 310.4, "rotational_speed_rpm": 1500,
//!  "torque_Nm": 40.2, "tool_wear_min": 108, "type": "M"}
//! ```
//!
//! Response: `{"failure_prediction": 0}` or `{"error": "..."}`.

use crate::error::MaintenanceError;
use crate::inference::{InferenceBackend, JSON_CONTENT_TYPE};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Product quality variant of the machine
///
/// Deserializes leniently: any letter other than `L` or `H` reads as `M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum MachineType {
    /// Low
    L,
    /// Medium
    M,
    /// High
    H,
}

impl MachineType {
    /// All variants
    pub const ALL: [MachineType; 3] = [MachineType::L, MachineType::M, MachineType::H];

    /// Decode a type letter; unknown letters fall back to M
    pub fn from_letter(letter: &str) -> Self {
        match letter.trim() {
            "L" => MachineType::L,
            "H" => MachineType::H,
            _ => MachineType::M,
        }
    }
}

impl From<String> for MachineType {
    fn from(letter: String) -> Self {
        MachineType::from_letter(&letter)
    }
}

/// One machine reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineReading {
    #[serde(rename = "air_temp_K")]
    pub air_temp_k: f64,
    #[serde(rename = "process_temp_K")]
    pub process_temp_k: f64,
    pub rotational_speed_rpm: u32,
    #[serde(rename = "torque_Nm")]
    pub torque_nm: f64,
    pub tool_wear_min: u32,
    #[serde(rename = "type")]
    pub machine_type: MachineType,
}

/// Binary failure prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureOutcome {
    Safe,
    Failure,
}

impl FailureOutcome {
    /// Decode the model output; any nonzero value is a failure
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            FailureOutcome::Safe
        } else {
            FailureOutcome::Failure
        }
    }
}

impl fmt::Display for FailureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOutcome::Safe => f.write_str("Safe"),
            FailureOutcome::Failure => f.write_str("Failure"),
        }
    }
}

#[derive(Deserialize)]
struct PredictionResponse {
    failure_prediction: Option<i64>,
    error: Option<String>,
}

/// Decode an endpoint response body
pub fn parse_response(body: &str) -> Result<FailureOutcome, MaintenanceError> {
    let response: PredictionResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        return Err(MaintenanceError::Remote(error));
    }
    response
        .failure_prediction
        .map(FailureOutcome::from_code)
        .ok_or(MaintenanceError::MissingPrediction)
}

/// A reading with the prediction it received
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceEntry {
    pub reading: MachineReading,
    pub outcome: FailureOutcome,
}

/// Readings sent so far, oldest first
#[derive(Debug, Clone, Default)]
pub struct MaintenanceLog {
    entries: Vec<MaintenanceEntry>,
}

impl MaintenanceLog {
    /// Entries oldest first
    pub fn entries(&self) -> &[MaintenanceEntry] {
        &self.entries
    }

    /// Entries newest first, as shown in the readings table
    pub fn newest_first(&self) -> impl Iterator<Item = &MaintenanceEntry> {
        self.entries.iter().rev()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of predicted failures
    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == FailureOutcome::Failure)
            .count()
    }
}

/// Client for the machine failure endpoint
pub struct MaintenanceClient {
    backend: Box<dyn InferenceBackend>,
    log: MaintenanceLog,
}

impl MaintenanceClient {
    /// Create a client over a transport
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            log: MaintenanceLog::default(),
        }
    }

    /// Create an HTTP client for `url`
    #[cfg(feature = "http")]
    pub fn http(url: &str) -> Self {
        Self::new(Box::new(crate::inference::HttpBackend::new(url, None)))
    }

    /// Readings that received a prediction
    pub fn log(&self) -> &MaintenanceLog {
        &self.log
    }

    /// Post one reading. Only successful predictions are logged.
    pub fn predict(&mut self, reading: &MachineReading) -> Result<FailureOutcome, MaintenanceError> {
        let body = serde_json::to_string(reading)?;
        let response = self.backend.invoke(JSON_CONTENT_TYPE, &body)?;

        let outcome = parse_response(&response).map_err(|e| {
            warn!("Machine failure prediction failed: {}", e);
            e
        })?;

        info!("Machine failure prediction: {}", outcome);
        self.log.entries.push(MaintenanceEntry {
            reading: reading.clone(),
            outcome,
        });
        Ok(outcome)
    }
}
