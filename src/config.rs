//! Configuration for the detector, the synthetic stream and the consumer.
//!
//! Every section has defaults matching the hourly energy demo, so an empty TOML
//! file (or no file at all) yields a runnable setup.

use crate::error::{DetectorError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Hyperparameters of the stream detector and its two models.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Buffer capacity; also the size of every retraining window.
    pub window_size: usize,
    /// Expected outlier fraction while fitting the scorer.
    pub sensitivity: f64,
    /// Seed for reproducible scorer fits.
    pub seed: u64,
    /// Output dimensionality of the projector. The stream is scalar, so only 1
    /// is accepted.
    pub n_components: usize,
    /// Number of isolation trees.
    pub n_estimators: usize,
    /// Upper bound on rows sampled per tree.
    pub max_samples: usize,
    /// Retrain after this many full-window detections. 1 retrains on every call.
    pub retrain_interval: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 24,
            sensitivity: 0.05,
            seed: 42,
            n_components: 1,
            n_estimators: 100,
            max_samples: 256,
            retrain_interval: 1,
        }
    }
}

impl DetectorConfig {
    /// Config with the given window and every other field at its default.
    pub fn with_window(window_size: usize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(DetectorError::InvalidConfiguration(
                "window size must be a positive integer".into(),
            ));
        }
        if !(self.sensitivity > 0.0 && self.sensitivity <= 0.5) {
            return Err(DetectorError::InvalidConfiguration(format!(
                "sensitivity must be in (0, 0.5], got {}",
                self.sensitivity
            )));
        }
        if self.n_components != 1 {
            return Err(DetectorError::InvalidConfiguration(format!(
                "n_components must be 1 for a scalar stream, got {}",
                self.n_components
            )));
        }
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(DetectorError::InvalidConfiguration(
                "n_estimators and max_samples must be positive integers".into(),
            ));
        }
        if self.retrain_interval == 0 {
            return Err(DetectorError::InvalidConfiguration(
                "retrain interval must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the synthetic energy stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub hours: usize,
    pub anomaly_freq: usize,
    /// Number of leading points used to seed the detector.
    pub initial_batch: usize,
    pub seed: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            hours: 168,
            anomaly_freq: 30,
            initial_batch: 24,
            seed: 42,
        }
    }
}

/// Presentation and persistence settings for the consumer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_path: PathBuf,
    pub frame_interval_ms: u64,
    pub animate: bool,
    pub width: usize,
    pub height: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("anomalies.csv"),
            frame_interval_ms: 100,
            animate: true,
            width: 72,
            height: 12,
        }
    }
}

/// Top-level configuration as read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub stream: StreamConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(s).map_err(|e| DetectorError::InvalidConfiguration(e.to_string()))?;
        config.detector.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
