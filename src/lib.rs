//! Windowed streaming anomaly detection for scalar time series.
//!
//! A [`StreamDetector`] buffers the most recent observations, projects them
//! with an incremental PCA, labels them with an isolation forest and retrains
//! both on the sliding window.

pub mod config;
pub mod error;
pub mod models;
pub mod utils;

#[cfg(feature = "python")]
mod python;

pub use config::{AppConfig, DetectorConfig, OutputConfig, StreamConfig};
pub use error::{DetectorError, Result};
pub use models::base_model::{Label, Projector, Scorer};
pub use models::detector::{DetectorState, StreamDetector};
pub use models::iforest::IsolationForest;
pub use models::ipca::IncrementalPca;
pub use models::window::WindowBuffer;
pub use utils::data_stream::{generate_energy_data_stream, EnergyStream};
pub use utils::evaluation::Evaluator;
pub use utils::visualization::{plot_energy_stream, AnomalyRecord};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pymodule]
fn stream_anomaly(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<python::PyStreamDetector>()?;
    m.add_function(wrap_pyfunction!(python::generate_energy_data_stream, m)?)?;
    Ok(())
}
