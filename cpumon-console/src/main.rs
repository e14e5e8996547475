// CPUMon Console - Operator console for the CPUMon pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # CPUMon Console
//!
//! Operator console for the CPU state monitor, plus the data tools that
//! come with it.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the console against the serial board
//! cpumon-console serve --device /dev/ttyACM0 --endpoint http://10.0.0.5:8080/invocations
//!
//! # Serve against the simulated board
//! cpumon-console serve --simulate --seed 42
//!
//! # Stream fake machine readings to the failure endpoint
//! cpumon-console send-machine-data --url http://localhost:8000/predict
//!
//! # Write train/test CSVs
//! cpumon-console generate-training-data --output data
//! ```

mod api;
mod sender;

use api::{router, AppState};
use clap::{Parser, Subcommand};
use cpumon::{
    ConfigError, DeviceConnector, DeviceSource, FileConnector, MaintenanceClient, MonitorConfig,
    SessionError, TcpConnector,
};
use cpumon_testdata::{
    write_training_files, MachineGenerator, SimulatedBoard, SimulatedConnector, TrainingConfig,
    TrainingError,
};
use sender::{run_sender, SenderConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// CPUMon operator console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the operator console (default)
    Serve(ServeArgs),

    /// Post fake machine readings to the failure endpoint
    SendMachineData {
        /// Failure endpoint URL (overrides the configuration)
        #[arg(short, long)]
        url: Option<String>,

        /// Seconds between readings
        #[arg(short, long, default_value = "2.0")]
        interval: f64,

        /// Stop after this many readings
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Write labelled train/test CSVs
    GenerateTrainingData {
        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: PathBuf,

        /// Number of samples
        #[arg(short, long, default_value = "10000")]
        samples: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Held-out share
        #[arg(long, default_value = "0.3")]
        test_fraction: f64,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8501")]
    port: u16,

    /// Inference endpoint URL (overrides the configuration)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Device path (overrides the configuration)
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Use the simulated sensor board
    #[arg(long)]
    simulate: bool,

    /// Seed for the simulated board
    #[arg(long)]
    seed: Option<u64>,

    /// Connect to the device at startup
    #[arg(long)]
    connect: bool,
}

/// Console error types.
#[derive(Debug, Error)]
enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Training data error: {0}")]
    Training(#[from] TrainingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("CPUMon Console v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ConsoleError> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            MonitorConfig::from_json_file(path)?
        }
        None => MonitorConfig::default(),
    };

    match args.command {
        None => serve(config, ServeArgs::default()).await,
        Some(Command::Serve(serve_args)) => serve(config, serve_args).await,
        Some(Command::SendMachineData {
            url,
            interval,
            count,
        }) => send_machine_data(config, url, interval, count).await,
        Some(Command::GenerateTrainingData {
            output,
            samples,
            seed,
            test_fraction,
        }) => {
            let training = TrainingConfig::new()
                .with_num_samples(samples)
                .with_seed(seed)
                .with_test_fraction(test_fraction);
            info!("Generating {} samples into {}", samples, output.display());
            let summary = write_training_files(&training, &output)?;
            info!(
                "Total samples: {}, training: {}, test: {}",
                summary.total, summary.train, summary.test
            );
            for (state, count) in &summary.state_distribution {
                info!("cpu_state {}: {}", state, count);
            }
            Ok(())
        }
    }
}

/// Build the device connector for a source.
fn connector_for(config: &MonitorConfig) -> Box<dyn DeviceConnector> {
    match &config.device {
        DeviceSource::File { path } => Box::new(FileConnector::new(
            path.clone(),
            Some(config.read_timeout()),
        )),
        DeviceSource::Tcp { addr } => {
            Box::new(TcpConnector::new(addr.clone(), Some(config.read_timeout())))
        }
        DeviceSource::Simulated { seed } => {
            let board = match seed {
                Some(s) => SimulatedBoard::new().with_seed(*s),
                None => SimulatedBoard::new(),
            };
            Box::new(SimulatedConnector::new(board))
        }
    }
}

fn apply_serve_overrides(mut config: MonitorConfig, args: &ServeArgs) -> MonitorConfig {
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if args.simulate {
        config = config.with_device(DeviceSource::Simulated { seed: args.seed });
    } else if let Some(path) = &args.device {
        config = config.with_device(DeviceSource::File { path: path.clone() });
    }
    config
}

/// One connect attempt before serving; a failure is logged, not fatal.
fn connect_at_startup(session: &mut cpumon::Session) -> bool {
    match session.connect() {
        Ok(()) => true,
        Err(e) => {
            warn!("Startup connect failed, retry with POST /connect: {}", e);
            false
        }
    }
}

async fn serve(config: MonitorConfig, args: ServeArgs) -> Result<(), ConsoleError> {
    let config = apply_serve_overrides(config, &args);
    let connector = connector_for(&config);
    let mut session = cpumon::Session::with_http(config, connector)?;

    info!("Device: {}", session.device_target());
    info!("Inference endpoint: {}", session.endpoint());

    if args.connect {
        connect_at_startup(&mut session);
    }

    let state = Arc::new(AppState::new(session));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn send_machine_data(
    config: MonitorConfig,
    url: Option<String>,
    interval: f64,
    count: Option<usize>,
) -> Result<(), ConsoleError> {
    if !interval.is_finite() || interval < 0.0 {
        return Err(ConsoleError::Argument(format!("invalid interval {}", interval)));
    }
    let url = url.unwrap_or(config.maintenance_url);
    info!("Sending machine readings to {}", url);

    let sender_config = SenderConfig {
        interval: Duration::from_secs_f64(interval),
        count,
    };

    let stats = tokio::task::spawn_blocking(move || {
        let mut client = MaintenanceClient::http(&url);
        let mut generator = MachineGenerator::default();
        run_sender(&mut client, &mut generator, &sender_config)
    })
    .await
    .map_err(|e| ConsoleError::Worker(e.to_string()))?;

    info!(
        "Sent {} readings ({} predicted failures, {} errors)",
        stats.sent, stats.failures_predicted, stats.errors
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_default_to_serve() {
        let args = Args::parse_from(["cpumon-console"]);
        assert!(args.command.is_none());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_subcommands() {
        let args = Args::parse_from([
            "cpumon-console",
            "send-machine-data",
            "--interval",
            "0.5",
            "-n",
            "3",
        ]);
        match args.command {
            Some(Command::SendMachineData {
                interval, count, ..
            }) => {
                assert_eq!(interval, 0.5);
                assert_eq!(count, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }

        let args = Args::parse_from(["cpumon-console", "serve", "--simulate", "--seed", "7"]);
        match args.command {
            Some(Command::Serve(serve)) => {
                assert!(serve.simulate);
                assert_eq!(serve.seed, Some(7));
                assert_eq!(serve.port, 8501);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let args = ServeArgs {
            endpoint: Some("http://10.0.0.5/invocations".to_string()),
            simulate: true,
            seed: Some(3),
            ..Default::default()
        };
        let config = apply_serve_overrides(MonitorConfig::default(), &args);
        assert_eq!(config.endpoint_url, "http://10.0.0.5/invocations");
        assert_eq!(config.device, DeviceSource::Simulated { seed: Some(3) });

        let connector = connector_for(&config);
        assert_eq!(connector.describe(), "simulated (seed 3)");
    }

    #[test]
    fn test_connector_for_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Temperature: 40 C").unwrap();
        file.flush().unwrap();

        let config = MonitorConfig::default().with_device(DeviceSource::File {
            path: file.path().to_path_buf(),
        });
        let mut device = connector_for(&config).connect().unwrap();
        let line = (0..100)
            .map(|_| device.read_line().unwrap())
            .find(|line| !line.is_empty());
        assert_eq!(line.as_deref(), Some("Temperature: 40 C"));
    }

    #[test]
    fn test_startup_connect_failure_is_not_fatal() {
        let config = MonitorConfig::default().with_device(DeviceSource::File {
            path: PathBuf::from("/nonexistent/cpumon/ttyACM0"),
        });
        let mut session =
            cpumon::Session::with_http(config.clone(), connector_for(&config)).unwrap();
        assert!(!connect_at_startup(&mut session));
        assert!(!session.is_connected());
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_fifo_respects_read_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("ttyFAKE");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
        assert!(status.success());
        // Hold a writer open that never writes
        let _writer = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&fifo)
            .unwrap();

        let mut config = MonitorConfig::default().with_device(DeviceSource::File { path: fifo });
        config.read_timeout_ms = 100;

        let mut device = connector_for(&config).connect().unwrap();
        let started = std::time::Instant::now();
        assert_eq!(device.read_line().unwrap(), "");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
