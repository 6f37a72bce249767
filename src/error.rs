//! Error types for the streaming anomaly detector and its collaborators.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Errors raised by the detector, its models and the stream collaborators.
#[derive(Error, Debug)]
pub enum DetectorError {
    /// A size, count or rate parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The seeding batch is shorter than the window.
    #[error("insufficient initial data: need at least {needed} points, got {got}")]
    InsufficientInitialData { needed: usize, got: usize },

    /// A value handed to `detect` is not a finite real number.
    #[error("invalid data point: {value} is not a finite number")]
    InvalidDataPoint { value: f64 },

    /// Transform, classify or detect called before the matching fit.
    #[error("{component} must be fitted before use")]
    UninitializedModel { component: &'static str },

    /// Data and label sequences differ in length.
    #[error("length mismatch: {data} data points but {labels} labels")]
    LengthMismatch { data: usize, labels: usize },

    /// The window buffer holds fewer observations than requested.
    #[error("window holds {available} observations, {requested} requested")]
    NotEnoughObservations { requested: usize, available: usize },

    /// A fit was attempted on an empty batch.
    #[error("{component} cannot be fitted on an empty batch")]
    EmptyBatch { component: &'static str },

    /// A batch does not have the feature count the model was fitted with.
    #[error("dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Fitting overflowed, leaving statistics that are not finite.
    #[error("{component} fit produced non-finite statistics")]
    NonFiniteFit { component: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
