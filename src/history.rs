// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Append-only prediction history
//!
//! One [`HistoryEntry`] per successful read-and-predict cycle, kept in
//! insertion order for the lifetime of the session. Filters return a
//! borrowed [`HistoryView`] and never touch the store.

use crate::classifier::SeverityState;
use crate::inference::PredictionResult;
use crate::sensor::{CompleteReading, Sensor};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sensors plotted when the operator has not picked any
pub const DEFAULT_SELECTED_SENSORS: [Sensor; 2] = [Sensor::Temperature, Sensor::CpuUsage];

/// One completed pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub reading: CompleteReading,
    /// Exact request body sent to the endpoint
    pub endpoint_input: String,
    pub prediction: PredictionResult,
}

/// Time series of one sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSeries {
    pub sensor: Sensor,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

/// Session history store
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Earliest and latest timestamps
    pub fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.entries.iter().map(|e| e.timestamp).min()?;
        let last = self.entries.iter().map(|e| e.timestamp).max()?;
        Some((first, last))
    }

    /// View over every entry
    pub fn all(&self) -> HistoryView<'_> {
        HistoryView {
            entries: self.entries.iter().collect(),
        }
    }

    /// Entries with `start <= timestamp <= end`
    pub fn in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> HistoryView<'_> {
        HistoryView {
            entries: self
                .entries
                .iter()
                .filter(|e| start <= e.timestamp && e.timestamp <= end)
                .collect(),
        }
    }

    /// Entries whose UTC calendar date is within `[start, end]`
    pub fn between_dates(&self, start: NaiveDate, end: NaiveDate) -> HistoryView<'_> {
        HistoryView {
            entries: self
                .entries
                .iter()
                .filter(|e| {
                    let day = e.timestamp.date_naive();
                    start <= day && day <= end
                })
                .collect(),
        }
    }
}

/// Borrowed, filtered slice of the history
#[derive(Debug, Clone)]
pub struct HistoryView<'a> {
    entries: Vec<&'a HistoryEntry>,
}

impl<'a> HistoryView<'a> {
    /// Entries in insertion order
    pub fn entries(&self) -> &[&'a HistoryEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = &'a HistoryEntry> + '_ {
        self.entries.iter().copied()
    }

    /// Time series of one sensor
    pub fn sensor_series(&self, sensor: Sensor) -> SensorSeries {
        SensorSeries {
            sensor,
            points: self
                .iter()
                .map(|e| (e.timestamp, e.reading.get(sensor)))
                .collect(),
        }
    }

    /// Time series for a sensor selection, in selection order.
    /// An empty selection yields no series.
    pub fn selected_series(&self, sensors: &[Sensor]) -> Vec<SensorSeries> {
        sensors.iter().map(|s| self.sensor_series(*s)).collect()
    }

    /// Predicted probability of one class over time
    pub fn probability_series(&self, state: SeverityState) -> Vec<(DateTime<Utc>, f64)> {
        self.iter()
            .map(|e| (e.timestamp, e.prediction.probabilities.get(state)))
            .collect()
    }

    /// Count of entries per predicted label; only labels that occur are present
    pub fn label_distribution(&self) -> BTreeMap<SeverityState, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.iter() {
            *counts.entry(entry.prediction.label).or_insert(0) += 1;
        }
        counts
    }
}
