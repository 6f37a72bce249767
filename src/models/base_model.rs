use crate::error::Result;
use ndarray::{Array2, ArrayView2};

/// Verdict for a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Normal,
    Anomalous,
}

impl Label {
    /// 0 for normal, 1 for anomalous.
    pub fn as_u8(self) -> u8 {
        match self {
            Label::Normal => 0,
            Label::Anomalous => 1,
        }
    }

    pub fn is_anomalous(self) -> bool {
        self == Label::Anomalous
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        label.as_u8()
    }
}

/// Reduces raw rows to a fixed low-dimensional representation.
///
/// Every `fit` is a full retrain: previous parameters are discarded.
pub trait Projector {
    /// Replace the fitted parameters with ones learnt from `batch`.
    fn fit(&mut self, batch: ArrayView2<f64>) -> Result<()>;

    /// Project each row of `batch` with the current parameters.
    fn transform(&self, batch: ArrayView2<f64>) -> Result<Array2<f64>>;

    fn is_fitted(&self) -> bool;

    /// Default: fit then transform the same batch.
    fn fit_transform(&mut self, batch: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(batch)?;
        self.transform(batch)
    }
}

/// Unsupervised outlier model over projected rows.
pub trait Scorer {
    /// Replace the fitted model with one trained on `batch`.
    fn fit(&mut self, batch: ArrayView2<f64>) -> Result<()>;

    /// Raw anomaly score per row; higher is more anomalous.
    fn score(&self, batch: ArrayView2<f64>) -> Result<Vec<f64>>;

    /// Normal / anomalous verdict per row.
    fn classify(&self, batch: ArrayView2<f64>) -> Result<Vec<Label>>;

    fn is_fitted(&self) -> bool;
}

/// Shape a scalar series as an `(n, 1)` matrix.
pub fn column(values: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((values.len(), 1), |(i, _)| values[i])
}
