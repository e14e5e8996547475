// CPUMon Testdata - Training set generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Labelled training data for the CPU state model.
//!
//! Raw values are drawn independently, then two correlations are applied:
//! fan speed follows temperature and current follows CPU usage. Each sample
//! carries one binary label per sensor and an overall state: 0 when no label
//! fires, 1 for one, 2 for two or more.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// CSV header of a training file
pub const TRAINING_CSV_HEADER: &str = "temperature,voltage,current,cpu_usage,fan_speed,\
temp_label,voltage_label,current_label,usage_label,fan_label,cpu_state";

/// Training data error types.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid distribution: {0}")]
    Distribution(String),

    #[error("Invalid test fraction: {0}")]
    TestFraction(f64),
}

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of samples to generate.
    pub num_samples: usize,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Share of samples held out for testing.
    pub test_fraction: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_samples: 10_000,
            seed: Some(42),
            test_fraction: 0.3,
        }
    }
}

impl TrainingConfig {
    /// Create a new config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of samples.
    pub fn with_num_samples(mut self, n: usize) -> Self {
        self.num_samples = n;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Draw from entropy instead of a fixed seed.
    pub fn unseeded(mut self) -> Self {
        self.seed = None;
        self
    }

    /// Set the held-out share.
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }
}

/// Per-sensor warning labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorLabels {
    pub temp: bool,
    pub voltage: bool,
    pub current: bool,
    pub usage: bool,
    pub fan: bool,
}

impl SensorLabels {
    /// Label a set of raw values.
    pub fn for_values(temperature: f64, voltage: f64, current: f64, cpu_usage: f64, fan_speed: f64) -> Self {
        Self {
            temp: temperature > 85.0,
            voltage: !(10.0..=14.0).contains(&voltage),
            current: current > 13.0,
            usage: cpu_usage > 90.0,
            fan: fan_speed < 1500.0,
        }
    }

    /// Number of labels set.
    pub fn count(&self) -> usize {
        [self.temp, self.voltage, self.current, self.usage, self.fan]
            .iter()
            .filter(|&&l| l)
            .count()
    }

    /// Overall state code (0, 1 or 2).
    pub fn cpu_state(&self) -> u8 {
        match self.count() {
            0 => 0,
            1 => 1,
            _ => 2,
        }
    }
}

/// One labelled sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub temperature: f64,
    pub voltage: f64,
    pub current: f64,
    pub cpu_usage: f64,
    pub fan_speed: f64,
    pub labels: SensorLabels,
    pub cpu_state: u8,
}

impl TrainingSample {
    /// Build a sample, deriving its labels.
    pub fn new(temperature: f64, voltage: f64, current: f64, cpu_usage: f64, fan_speed: f64) -> Self {
        let labels = SensorLabels::for_values(temperature, voltage, current, cpu_usage, fan_speed);
        Self {
            temperature,
            voltage,
            current,
            cpu_usage,
            fan_speed,
            labels,
            cpu_state: labels.cpu_state(),
        }
    }

    fn write_row<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let l = &self.labels;
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{}",
            self.temperature,
            self.voltage,
            self.current,
            self.cpu_usage,
            self.fan_speed,
            u8::from(l.temp),
            u8::from(l.voltage),
            u8::from(l.current),
            u8::from(l.usage),
            u8::from(l.fan),
            self.cpu_state
        )
    }
}

/// Generated samples, in generation order.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub samples: Vec<TrainingSample>,
}

/// Summary printed after generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub total: usize,
    pub train: usize,
    pub test: usize,
    /// Sample count per state code
    pub state_distribution: BTreeMap<u8, usize>,
}

impl TrainingSet {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample count per state code.
    pub fn state_distribution(&self) -> BTreeMap<u8, usize> {
        let mut dist = BTreeMap::new();
        for sample in &self.samples {
            *dist.entry(sample.cpu_state).or_insert(0) += 1;
        }
        dist
    }

    /// Shuffle and split into (train, test).
    ///
    /// The test share is rounded up, matching the usual ML tooling.
    pub fn split(&self, config: &TrainingConfig) -> Result<(TrainingSet, TrainingSet), TrainingError> {
        if !(0.0..1.0).contains(&config.test_fraction) {
            return Err(TrainingError::TestFraction(config.test_fraction));
        }

        let mut shuffled = self.samples.clone();
        shuffled.shuffle(&mut config.rng());

        let n_test = (self.samples.len() as f64 * config.test_fraction).ceil() as usize;
        let train = shuffled.split_off(n_test);
        Ok((TrainingSet { samples: train }, TrainingSet { samples: shuffled }))
    }

    /// Export to CSV file.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), TrainingError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write CSV to any writer.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> Result<(), TrainingError> {
        writeln!(writer, "{}", TRAINING_CSV_HEADER)?;
        for sample in &self.samples {
            sample.write_row(writer)?;
        }
        Ok(())
    }
}

fn normal(mean: f64, std: f64) -> Result<Normal<f64>, TrainingError> {
    Normal::new(mean, std).map_err(|e| TrainingError::Distribution(e.to_string()))
}

/// Generate a labelled training set.
pub fn generate_training_set(config: &TrainingConfig) -> Result<TrainingSet, TrainingError> {
    let mut rng = config.rng();

    let temperature = normal(70.0, 15.0)?;
    let voltage = normal(12.0, 1.0)?;
    let current = normal(10.0, 2.0)?;
    let cpu_usage = Uniform::new(0.0, 100.0);
    let fan_speed = normal(2000.0, 500.0)?;

    let samples = (0..config.num_samples)
        .map(|_| {
            let t = temperature.sample(&mut rng);
            let v = voltage.sample(&mut rng);
            let c = current.sample(&mut rng);
            let u = cpu_usage.sample(&mut rng);
            let f = fan_speed.sample(&mut rng);

            // Correlations
            let f = f + t * 10.0;
            let c = c + u * 0.05;

            TrainingSample::new(t, v, c, u, f)
        })
        .collect();

    Ok(TrainingSet { samples })
}

/// Generate, split and write `train_data.csv` / `test_data.csv` into `dir`.
pub fn write_training_files(
    config: &TrainingConfig,
    dir: impl AsRef<Path>,
) -> Result<TrainingSummary, TrainingError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let set = generate_training_set(config)?;
    let (train, test) = set.split(config)?;
    train.to_csv(dir.join("train_data.csv"))?;
    test.to_csv(dir.join("test_data.csv"))?;

    let summary = TrainingSummary {
        total: set.len(),
        train: train.len(),
        test: test.len(),
        state_distribution: set.state_distribution(),
    };
    std::fs::write(dir.join("summary.json"), serde_json::to_string_pretty(&summary)?)?;
    Ok(summary)
}
