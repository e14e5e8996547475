// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Inference latency records and per-network statistics
//!
//! Every successful inference call is tagged with the network condition the
//! operator had selected, so that links (4G vs 5G) can be compared.

use crate::classifier::SeverityState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator-selected network condition label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkTag(String);

impl NetworkTag {
    /// Create a new tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NetworkTag {
    fn default() -> Self {
        Self::new("4G")
    }
}

impl fmt::Display for NetworkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// One timed inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    /// When the call completed
    pub timestamp: DateTime<Utc>,
    /// Network condition active at call time
    pub network: NetworkTag,
    /// Round-trip time in milliseconds
    pub latency_ms: f64,
    /// Predicted class
    pub prediction: SeverityState,
}

/// Descriptive statistics of one network's latencies
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Sample standard deviation (n - 1); `None` below two samples
    pub std_dev_ms: Option<f64>,
}

impl LatencySummary {
    /// Summarize a set of latencies; `None` if empty
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std_dev = if count >= 2 {
            let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(var.sqrt())
        } else {
            None
        };

        Some(Self {
            count,
            mean_ms: mean,
            min_ms: min,
            max_ms: max,
            std_dev_ms: std_dev,
        })
    }
}

/// Append-only sequence of latency records
#[derive(Debug, Clone, Default)]
pub struct LatencyLog {
    records: Vec<LatencyRecord>,
}

impl LatencyLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn record(&mut self, record: LatencyRecord) {
        self.records.push(record);
    }

    /// All records in insertion order
    pub fn records(&self) -> &[LatencyRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for one network
    pub fn for_network<'a>(
        &'a self,
        network: &'a NetworkTag,
    ) -> impl Iterator<Item = &'a LatencyRecord> + 'a {
        self.records.iter().filter(move |r| &r.network == network)
    }

    /// Distinct networks, in order of first appearance
    pub fn networks(&self) -> Vec<NetworkTag> {
        let mut seen: Vec<NetworkTag> = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.network) {
                seen.push(record.network.clone());
            }
        }
        seen
    }

    /// Statistics for one network
    pub fn summary(&self, network: &NetworkTag) -> Option<LatencySummary> {
        let samples: Vec<f64> = self.for_network(network).map(|r| r.latency_ms).collect();
        LatencySummary::from_samples(&samples)
    }

    /// Mean latency reduction of `candidate` relative to `baseline`, in percent.
    ///
    /// Positive means the candidate is faster.
    pub fn improvement_percent(&self, baseline: &NetworkTag, candidate: &NetworkTag) -> Option<f64> {
        let base = self.summary(baseline)?;
        let cand = self.summary(candidate)?;
        if base.mean_ms == 0.0 {
            return None;
        }
        Some((base.mean_ms - cand.mean_ms) / base.mean_ms * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(network: &str, latency_ms: f64) -> LatencyRecord {
        LatencyRecord {
            timestamp: Utc::now(),
            network: NetworkTag::new(network),
            latency_ms,
            prediction: SeverityState::Normal,
        }
    }

    #[test]
    fn test_summary() {
        let summary = LatencySummary::from_samples(&[100.0, 200.0, 300.0]).unwrap();
        assert_eq!(summary.count, 3);
        assert_relative_eq!(summary.mean_ms, 200.0);
        assert_relative_eq!(summary.min_ms, 100.0);
        assert_relative_eq!(summary.max_ms, 300.0);
        assert_relative_eq!(summary.std_dev_ms.unwrap(), 100.0);
    }

    #[test]
    fn test_summary_single_sample() {
        let summary = LatencySummary::from_samples(&[42.0]).unwrap();
        assert_eq!(summary.std_dev_ms, None);
        assert!(LatencySummary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_per_network_grouping() {
        let mut log = LatencyLog::new();
        log.record(record("4G", 120.0));
        log.record(record("5G", 40.0));
        log.record(record("4G", 80.0));

        assert_eq!(log.len(), 3);
        assert_eq!(log.networks(), vec![NetworkTag::new("4G"), NetworkTag::new("5G")]);
        assert_eq!(log.for_network(&NetworkTag::new("4G")).count(), 2);
        assert_relative_eq!(log.summary(&"4G".into()).unwrap().mean_ms, 100.0);
        assert!(log.summary(&"3G".into()).is_none());
    }

    #[test]
    fn test_improvement() {
        let mut log = LatencyLog::new();
        log.record(record("4G", 100.0));
        log.record(record("5G", 25.0));

        let improvement = log.improvement_percent(&"4G".into(), &"5G".into()).unwrap();
        assert_relative_eq!(improvement, 75.0);
        assert!(log.improvement_percent(&"4G".into(), &"WiFi".into()).is_none());
    }

    #[test]
    fn test_tag_serializes_as_string() {
        let json = serde_json::to_string(&NetworkTag::new("5G")).unwrap();
        assert_eq!(json, "\"5G\"");
    }
}
