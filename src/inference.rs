// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Inference endpoint client
//!
//! One request carries one feature vector as `text/csv`; the response body is
//! three comma-separated probabilities in class order Normal, Warning,
//! Critical. The client times the call, picks the most likely class and
//! appends a [`LatencyRecord`] tagged with the active network condition.
//!
//! There is no retry: any transport or parse failure aborts the call and no
//! latency record is written.

use crate::classifier::SeverityState;
use crate::error::{InferenceError, ParseError};
use crate::features::FeatureVector;
use crate::latency::{LatencyLog, LatencyRecord, NetworkTag};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Content type of feature vector requests
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Content type of JSON requests
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Probability sums further than this from 1.0 are logged
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Transport to an opaque classification endpoint
pub trait InferenceBackend: Send {
    /// Send one request body and return the response body
    fn invoke(&self, content_type: &str, body: &str) -> Result<String, InferenceError>;

    /// Human-readable endpoint name, for logs
    fn endpoint(&self) -> String {
        String::from("<unnamed>")
    }
}

/// HTTP POST transport
#[cfg(feature = "http")]
pub struct HttpBackend {
    agent: ureq::Agent,
    url: String,
}

#[cfg(feature = "http")]
impl HttpBackend {
    /// Create a backend posting to `url`, with an optional overall timeout
    pub fn new(url: impl Into<String>, timeout: Option<std::time::Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            url: url.into(),
        }
    }
}

#[cfg(feature = "http")]
impl InferenceBackend for HttpBackend {
    fn invoke(&self, content_type: &str, body: &str) -> Result<String, InferenceError> {
        let response = self
            .agent
            .post(&self.url)
            .set("Content-Type", content_type)
            .send_string(body);

        match response {
            Ok(resp) => resp
                .into_string()
                .map_err(|e| InferenceError::Transport(e.to_string())),
            Err(ureq::Error::Status(code, resp)) => {
                let detail = resp.into_string().unwrap_or_default();
                Err(InferenceError::Transport(format!(
                    "HTTP {}: {}",
                    code,
                    detail.trim()
                )))
            }
            Err(e) => Err(InferenceError::Transport(e.to_string())),
        }
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// Class probabilities in class order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub normal: f64,
    pub warning: f64,
    pub critical: f64,
}

impl ClassProbabilities {
    /// Create from values in class order
    pub fn new(normal: f64, warning: f64, critical: f64) -> Self {
        Self {
            normal,
            warning,
            critical,
        }
    }

    /// Probability of one class
    pub fn get(&self, state: SeverityState) -> f64 {
        match state {
            SeverityState::Normal => self.normal,
            SeverityState::Warning => self.warning,
            SeverityState::Critical => self.critical,
        }
    }

    /// Values in class order
    pub fn as_array(&self) -> [f64; 3] {
        [self.normal, self.warning, self.critical]
    }

    /// Sum of all three
    pub fn sum(&self) -> f64 {
        self.normal + self.warning + self.critical
    }

    /// Most likely class. Ties go to the earlier class (Normal before
    /// Warning before Critical).
    pub fn argmax(&self) -> SeverityState {
        let mut best = SeverityState::Normal;
        for state in [SeverityState::Warning, SeverityState::Critical] {
            if self.get(state) > self.get(best) {
                best = state;
            }
        }
        best
    }
}

/// Parse a response body into exactly three probabilities
pub fn parse_probabilities(body: &str) -> Result<ClassProbabilities, ParseError> {
    let fields: Vec<&str> = body.trim().split(',').collect();
    if fields.len() != 3 {
        return Err(ParseError::FieldCount {
            expected: 3,
            actual: fields.len(),
        });
    }

    let mut values = [0.0; 3];
    for (position, (slot, token)) in values.iter_mut().zip(&fields).enumerate() {
        *slot = token
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidNumber {
                position,
                token: token.to_string(),
            })?;
    }
    Ok(ClassProbabilities::new(values[0], values[1], values[2]))
}

/// Outcome of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probabilities: ClassProbabilities,
    /// Argmax class
    pub label: SeverityState,
    /// Round-trip time in milliseconds
    pub latency_ms: f64,
}

/// Client for the CPU state endpoint
pub struct InferenceClient {
    backend: Box<dyn InferenceBackend>,
    latency: LatencyLog,
}

impl InferenceClient {
    /// Create a client over a transport
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            latency: LatencyLog::new(),
        }
    }

    /// Latency history of successful calls
    pub fn latency_log(&self) -> &LatencyLog {
        &self.latency
    }

    /// Endpoint name
    pub fn endpoint(&self) -> String {
        self.backend.endpoint()
    }

    /// Submit one feature vector
    pub fn predict(
        &mut self,
        features: &FeatureVector,
        network: &NetworkTag,
    ) -> Result<PredictionResult, InferenceError> {
        let body = features.to_csv();
        debug!("Invoking {} with {}", self.backend.endpoint(), body);

        let start = Instant::now();
        let response = self.backend.invoke(CSV_CONTENT_TYPE, &body).map_err(|e| {
            warn!("Inference call failed: {}", e);
            e
        })?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let probabilities = parse_probabilities(&response).map_err(|e| {
            warn!("Unparseable inference response {:?}: {}", response.trim(), e);
            InferenceError::from(e)
        })?;

        if (probabilities.sum() - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            warn!(
                "Class probabilities sum to {:.4}, expected 1.0",
                probabilities.sum()
            );
        }

        let label = probabilities.argmax();
        self.latency.record(LatencyRecord {
            timestamp: Utc::now(),
            network: network.clone(),
            latency_ms,
            prediction: label,
        });

        info!(
            "Predicted {} in {:.1} ms over {}",
            label, latency_ms, network
        );

        Ok(PredictionResult {
            probabilities,
            label,
            latency_ms,
        })
    }
}
