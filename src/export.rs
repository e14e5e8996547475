// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CSV export of history and latency records.

use crate::error::ExportError;
use crate::history::HistoryEntry;
use crate::latency::LatencyRecord;
use serde::Serialize;
use std::io::Write;

/// Header row of the history export
pub const HISTORY_CSV_HEADER: &str = "timestamp,temperature,voltage,current,cpu_usage,fan_speed,endpoint_input,prediction,prob_normal,prob_warning,prob_critical";

/// Header row of the latency export
pub const LATENCY_CSV_HEADER: &str = "timestamp,network_type,latency_ms,prediction";

#[derive(Serialize)]
struct HistoryRow<'a> {
    timestamp: String,
    temperature: f64,
    voltage: f64,
    current: f64,
    cpu_usage: f64,
    fan_speed: f64,
    endpoint_input: &'a str,
    prediction: &'static str,
    prob_normal: f64,
    prob_warning: f64,
    prob_critical: f64,
}

impl<'a> From<&'a HistoryEntry> for HistoryRow<'a> {
    fn from(entry: &'a HistoryEntry) -> Self {
        let r = &entry.reading;
        let p = &entry.prediction.probabilities;
        Self {
            timestamp: entry.timestamp.to_rfc3339(),
            temperature: r.temperature,
            voltage: r.voltage,
            current: r.current,
            cpu_usage: r.cpu_usage,
            fan_speed: r.fan_speed,
            endpoint_input: &entry.endpoint_input,
            prediction: entry.prediction.label.name(),
            prob_normal: p.normal,
            prob_warning: p.warning,
            prob_critical: p.critical,
        }
    }
}

#[derive(Serialize)]
struct LatencyRow<'a> {
    timestamp: String,
    network_type: &'a str,
    latency_ms: f64,
    prediction: &'static str,
}

/// Write history entries as CSV with a header row
pub fn write_history_csv<'a, W, I>(writer: W, entries: I) -> Result<W, ExportError>
where
    W: Write,
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(HISTORY_CSV_HEADER.split(','))?;
    for entry in entries {
        csv_writer.serialize(HistoryRow::from(entry))?;
    }
    csv_writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// Write latency records as CSV with a header row
pub fn write_latency_csv<'a, W, I>(writer: W, records: I) -> Result<W, ExportError>
where
    W: Write,
    I: IntoIterator<Item = &'a LatencyRecord>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(LATENCY_CSV_HEADER.split(','))?;
    for record in records {
        csv_writer.serialize(LatencyRow {
            timestamp: record.timestamp.to_rfc3339(),
            network_type: record.network.as_str(),
            latency_ms: record.latency_ms,
            prediction: record.prediction.name(),
        })?;
    }
    csv_writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// History export as a string
pub fn history_csv_string<'a, I>(entries: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    let bytes = write_history_csv(Vec::new(), entries)?;
    Ok(String::from_utf8(bytes)?)
}

/// Latency export as a string
pub fn latency_csv_string<'a, I>(records: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a LatencyRecord>,
{
    let bytes = write_latency_csv(Vec::new(), records)?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SeverityState;
    use crate::inference::{ClassProbabilities, PredictionResult};
    use crate::latency::NetworkTag;
    use crate::sensor::CompleteReading;
    use chrono::{TimeZone, Utc};

    fn entry() -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.with_ymd_and_hms(2025, 4, 13, 18, 30, 0).unwrap(),
            reading: CompleteReading::from_values([90.0, 3.2, 1.0, 50.0, 2000.0]),
            endpoint_input: String::from("90.0,3.2,1.0,50.0,2000.0,2,0,0,0,0"),
            prediction: PredictionResult {
                probabilities: ClassProbabilities::new(0.1, 0.2, 0.7),
                label: SeverityState::Critical,
                latency_ms: 153.5,
            },
        }
    }

    #[test]
    fn test_history_csv() {
        let entries = vec![entry()];
        let csv = history_csv_string(&entries).unwrap();
        let mut lines = csv.lines();

        assert_eq!(lines.next(), Some(HISTORY_CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("2025-04-13T18:30:00+00:00,90.0,3.2,1.0,50.0,2000.0,\"90.0,3.2,1.0,50.0,2000.0,2,0,0,0,0\",Critical,0.1,0.2,0.7")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_history_has_header_only() {
        let csv = history_csv_string(std::iter::empty()).unwrap();
        assert_eq!(csv.trim_end(), HISTORY_CSV_HEADER);
    }

    #[test]
    fn test_latency_csv() {
        let records = vec![LatencyRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 4, 13, 18, 30, 0).unwrap(),
            network: NetworkTag::new("5G"),
            latency_ms: 42.5,
            prediction: SeverityState::Warning,
        }];
        let csv = latency_csv_string(&records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], LATENCY_CSV_HEADER);
        assert_eq!(lines[1], "2025-04-13T18:30:00+00:00,5G,42.5,Warning");
    }

    #[test]
    fn test_write_to_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let entries = vec![entry(), entry()];
        write_history_csv(file.reopen().unwrap(), &entries).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
