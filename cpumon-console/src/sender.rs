// CPUMon Console - Machine data sender
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Posts fake machine readings to the failure endpoint at a fixed interval.

use cpumon::{FailureOutcome, MaintenanceClient};
use cpumon_testdata::MachineGenerator;
use std::time::Duration;
use tracing::{info, warn};

/// Sender loop settings.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Pause between readings.
    pub interval: Duration,
    /// Stop after this many readings (None = run forever).
    pub count: Option<usize>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            count: None,
        }
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub sent: usize,
    pub failures_predicted: usize,
    pub errors: usize,
}

/// Run the loop. Send errors are logged and the loop continues.
pub fn run_sender(
    client: &mut MaintenanceClient,
    generator: &mut MachineGenerator,
    config: &SenderConfig,
) -> SenderStats {
    let mut stats = SenderStats::default();
    let mut iteration = 0usize;

    loop {
        if config.count.is_some_and(|n| iteration >= n) {
            break;
        }
        iteration += 1;

        let reading = generator.next_reading();
        info!(
            "Sending: air={}K process={}K speed={}rpm torque={}Nm wear={}min type={:?}",
            reading.air_temp_k,
            reading.process_temp_k,
            reading.rotational_speed_rpm,
            reading.torque_nm,
            reading.tool_wear_min,
            reading.machine_type
        );

        match client.predict(&reading) {
            Ok(outcome) => {
                stats.sent += 1;
                if outcome == FailureOutcome::Failure {
                    stats.failures_predicted += 1;
                }
                info!("Response: {}", outcome);
            }
            Err(e) => {
                stats.errors += 1;
                warn!("Failed to send: {}", e);
            }
        }

        if !config.interval.is_zero() {
            std::thread::sleep(config.interval);
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpumon::{InferenceBackend, InferenceError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Alternates failure, transport error, safe.
    struct CyclingBackend(AtomicUsize);

    impl InferenceBackend for CyclingBackend {
        fn invoke(&self, _content_type: &str, _body: &str) -> Result<String, InferenceError> {
            match self.0.fetch_add(1, Ordering::SeqCst) % 3 {
                0 => Ok(r#"{"failure_prediction": 1}"#.to_string()),
                1 => Err(InferenceError::Transport("connection refused".to_string())),
                _ => Ok(r#"{"failure_prediction": 0}"#.to_string()),
            }
        }
    }

    #[test]
    fn test_sender_continues_after_errors() {
        let mut client = MaintenanceClient::new(Box::new(CyclingBackend(AtomicUsize::new(0))));
        let mut generator = MachineGenerator::new(Some(42));
        let config = SenderConfig {
            interval: Duration::ZERO,
            count: Some(6),
        };

        let stats = run_sender(&mut client, &mut generator, &config);
        assert_eq!(
            stats,
            SenderStats {
                sent: 4,
                failures_predicted: 2,
                errors: 2
            }
        );
        assert_eq!(client.log().len(), 4);
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(SenderConfig::default().interval, Duration::from_secs(2));
    }
}
