//! Error types for CPUMon
//!
//! This module defines all error types used throughout the library.
//! An incomplete reading is not an error: it is reported as
//! [`CycleOutcome::Skipped`](crate::session::CycleOutcome::Skipped).

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Top-level error for one pipeline invocation
#[derive(Error, Debug)]
pub enum SessionError {
    /// Device unavailable or read failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Inference call failed (transport or response parse)
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    /// Network tag not in the configured list
    #[error("Unknown network type: {0}")]
    UnknownNetwork(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors on the device side of the pipeline (connectivity errors)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// No open device handle
    #[error("Device not connected")]
    NotConnected,

    /// Opening the device failed
    #[error("Failed to open {target}: {reason}")]
    Open { target: String, reason: String },

    /// Reading a line failed
    #[error("Read failed: {0}")]
    Read(String),

    /// The line is not valid UTF-8
    #[error("Failed to decode line: {0}")]
    Decode(String),

    /// The device closed the stream
    #[error("Device closed the stream")]
    Closed,
}

/// Errors while decoding delimited numeric text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Wrong number of comma-separated fields
    #[error("Expected {expected} values, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    /// A field is not a number
    #[error("Invalid number at position {position}: {token:?}")]
    InvalidNumber { position: usize, token: String },
}

/// Errors calling the inference endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// Network or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response did not decode to the expected values
    #[error("Invalid response: {0}")]
    Parse(#[from] ParseError),
}

/// Errors while writing CSV exports
#[derive(Error, Debug)]
pub enum ExportError {
    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output is not UTF-8
    #[error("Output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Semantically invalid value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from the machine failure prediction endpoint
#[derive(Error, Debug)]
pub enum MaintenanceError {
    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] InferenceError),

    /// Request or response JSON is malformed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint reported an error
    #[error("Endpoint error: {0}")]
    Remote(String),

    /// Response has neither a prediction nor an error
    #[error("Response has no failure_prediction")]
    MissingPrediction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::Inference(InferenceError::Parse(ParseError::FieldCount {
            expected: 3,
            actual: 2,
        }));
        let msg = format!("{}", err);
        assert!(msg.contains("Expected 3"));
        assert!(msg.contains("got 2"));
    }

    #[test]
    fn test_error_conversion() {
        let device_err = DeviceError::Read("timed out".to_string());
        let session_err: SessionError = device_err.into();
        assert!(matches!(session_err, SessionError::Device(_)));

        let parse_err = ParseError::InvalidNumber {
            position: 1,
            token: "abc".to_string(),
        };
        let inference_err: InferenceError = parse_err.into();
        assert!(matches!(inference_err, InferenceError::Parse(_)));
    }
}
