use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::models::detector::StreamDetector;
use crate::utils::data_stream;
use numpy::{PyArray1, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyAny;

impl From<DetectorError> for PyErr {
    fn from(err: DetectorError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

fn positive(name: &str, value: i64) -> PyResult<usize> {
    if value <= 0 {
        return Err(DetectorError::InvalidConfiguration(format!(
            "{name} must be a positive integer, got {value}"
        ))
        .into());
    }
    Ok(value as usize)
}

/// Python-exposed wrapper around `StreamDetector`
#[pyclass(unsendable, name = "StreamAnomalyDetector")]
pub struct PyStreamDetector {
    inner: StreamDetector,
}

#[pymethods]
impl PyStreamDetector {
    #[new]
    #[pyo3(signature = (window_size=24, contamination=0.05, random_state=42))]
    fn new(window_size: i64, contamination: f64, random_state: u64) -> PyResult<Self> {
        let config = DetectorConfig {
            window_size: positive("window_size", window_size)?,
            sensitivity: contamination,
            seed: random_state,
            ..DetectorConfig::default()
        };
        Ok(Self {
            inner: StreamDetector::with_config(config)?,
        })
    }

    fn fit_initial(&mut self, data: &PyArray1<f64>) -> PyResult<()> {
        let slice = unsafe { data.as_slice()? };
        self.inner.initial_fit(slice)?;
        Ok(())
    }

    fn detect(&mut self, value: &PyAny) -> PyResult<u8> {
        let value: f64 = value
            .extract()
            .map_err(|_| PyValueError::new_err("data point must be a number"))?;
        Ok(self.inner.detect(value)?.as_u8())
    }

    #[getter]
    fn window_size(&self) -> usize {
        self.inner.window_size()
    }

    #[getter]
    fn buffer_len(&self) -> usize {
        self.inner.buffer_len()
    }
}

#[pyfunction]
#[pyo3(signature = (hours=168, anomaly_freq=30))]
pub fn generate_energy_data_stream(
    py: Python<'_>,
    hours: i64,
    anomaly_freq: i64,
) -> PyResult<Py<PyArray1<f64>>> {
    let stream = data_stream::generate_energy_data_stream(
        positive("hours", hours)?,
        positive("anomaly_freq", anomaly_freq)?,
    )?;
    Ok(stream.values.to_pyarray(py).into_py(py))
}
