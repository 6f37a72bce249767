use crate::error::{DetectorError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Seed used by [`generate_energy_data_stream`].
pub const DEFAULT_SEED: u64 = 42;

const HOURS_PER_DAY: usize = 24;

/// Synthetic hourly energy usage together with the positions of injected spikes.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyStream {
    pub values: Vec<f64>,
    pub anomaly_indices: Vec<usize>,
}

impl EnergyStream {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Generate `hours` points with a spike every `anomaly_freq` hours, using the
/// default seed.
pub fn generate_energy_data_stream(hours: usize, anomaly_freq: usize) -> Result<EnergyStream> {
    generate_energy_data_stream_seeded(hours, anomaly_freq, DEFAULT_SEED)
}

/// Daily sine pattern, scaled by `N(1, 0.1)` and shifted by `N(0, 0.05)` noise.
/// Every index `i` with `i % anomaly_freq == 0` gets an extra `N(5, 1)` spike.
pub fn generate_energy_data_stream_seeded(
    hours: usize,
    anomaly_freq: usize,
    seed: u64,
) -> Result<EnergyStream> {
    if hours == 0 {
        return Err(DetectorError::InvalidConfiguration(
            "hours must be a positive integer".into(),
        ));
    }
    if anomaly_freq == 0 {
        return Err(DetectorError::InvalidConfiguration(
            "anomaly frequency must be a positive integer".into(),
        ));
    }

    let variation = normal(1.0, 0.1)?;
    let noise = normal(0.0, 0.05)?;
    let spike = normal(5.0, 1.0)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let step = 2.0 * PI / (HOURS_PER_DAY - 1) as f64;
    let daily: Vec<f64> = (0..HOURS_PER_DAY).map(|h| (h as f64 * step).sin()).collect();

    let scale: Vec<f64> = (0..hours).map(|_| variation.sample(&mut rng)).collect();
    let mut values: Vec<f64> = (0..hours)
        .map(|i| daily[i % HOURS_PER_DAY] * scale[i] + noise.sample(&mut rng))
        .collect();

    let anomaly_indices: Vec<usize> = (0..hours).step_by(anomaly_freq).collect();
    for &i in &anomaly_indices {
        values[i] += spike.sample(&mut rng);
    }

    Ok(EnergyStream {
        values,
        anomaly_indices,
    })
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| DetectorError::InvalidConfiguration(e.to_string()))
}
