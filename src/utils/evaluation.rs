use crate::error::{DetectorError, Result};
use crate::models::base_model::Label;
use std::collections::HashSet;

/// Confusion counts and derived metrics of predicted labels against known
/// anomaly positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evaluator {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
}

impl Evaluator {
    /// Score `predicted` against the indices that are truly anomalous.
    /// Indices past the end of `predicted` are rejected.
    pub fn from_labels(truth: &[usize], predicted: &[Label]) -> Result<Self> {
        if let Some(&index) = truth.iter().find(|&&i| i >= predicted.len()) {
            return Err(DetectorError::LengthMismatch {
                data: index + 1,
                labels: predicted.len(),
            });
        }
        let truth: HashSet<usize> = truth.iter().copied().collect();

        let mut eval = Evaluator::default();
        for (i, label) in predicted.iter().enumerate() {
            match (truth.contains(&i), label.is_anomalous()) {
                (true, true) => eval.true_positives += 1,
                (false, true) => eval.false_positives += 1,
                (true, false) => eval.false_negatives += 1,
                (false, false) => eval.true_negatives += 1,
            }
        }
        Ok(eval)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}
