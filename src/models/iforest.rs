use crate::error::{DetectorError, Result};
use crate::models::base_model::{Label, Scorer};
use ndarray::{ArrayView1, ArrayView2};
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct Fitted {
    trees: Vec<Node>,
    n_features: usize,
    sample_size: usize,
    threshold: f64,
}

/// Isolation forest with a contamination-derived decision threshold.
///
/// Each fit starts from the configured seed, so fitting the same batch twice
/// reproduces the same trees and boundary. Tree `i` draws from its own
/// `StdRng` seeded with `seed + i`, which keeps the parallel build deterministic.
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    seed: u64,
    fitted: Option<Fitted>,
}

impl IsolationForest {
    pub fn new(
        n_estimators: usize,
        max_samples: usize,
        contamination: f64,
        seed: u64,
    ) -> Result<Self> {
        if n_estimators == 0 || max_samples == 0 {
            return Err(DetectorError::InvalidConfiguration(
                "n_estimators and max_samples must be positive integers".into(),
            ));
        }
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(DetectorError::InvalidConfiguration(format!(
                "contamination must be in (0, 0.5], got {contamination}"
            )));
        }
        Ok(Self {
            n_estimators,
            max_samples,
            contamination,
            seed,
            fitted: None,
        })
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Score above which a row is labelled anomalous.
    pub fn threshold(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.threshold)
    }

    /// Rows drawn per tree in the last fit.
    pub fn sample_size(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.sample_size)
    }

    pub fn n_trees(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.trees.len())
    }

    fn fitted(&self, batch: ArrayView2<f64>) -> Result<&Fitted> {
        let fitted = self.fitted.as_ref().ok_or(DetectorError::UninitializedModel {
            component: "scorer",
        })?;
        if batch.ncols() != fitted.n_features {
            return Err(DetectorError::DimensionMismatch {
                expected: fitted.n_features,
                got: batch.ncols(),
            });
        }
        Ok(fitted)
    }
}

impl Scorer for IsolationForest {
    fn fit(&mut self, batch: ArrayView2<f64>) -> Result<()> {
        let n = batch.nrows();
        if n == 0 || batch.ncols() == 0 {
            return Err(DetectorError::EmptyBatch { component: "scorer" });
        }
        let sample_size = self.max_samples.min(n);
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let seed = self.seed;

        let trees: Vec<Node> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let rows = index::sample(&mut rng, n, sample_size).into_vec();
                build_tree(batch, &rows, 0, height_limit, &mut rng)
            })
            .collect();

        let mut training: Vec<f64> = batch
            .outer_iter()
            .map(|row| anomaly_score(&trees, row, sample_size))
            .collect();
        training.sort_by(f64::total_cmp);
        let threshold = quantile(&training, 1.0 - self.contamination);

        self.fitted = Some(Fitted {
            trees,
            n_features: batch.ncols(),
            sample_size,
            threshold,
        });
        Ok(())
    }

    fn score(&self, batch: ArrayView2<f64>) -> Result<Vec<f64>> {
        let fitted = self.fitted(batch)?;
        Ok(batch
            .outer_iter()
            .map(|row| anomaly_score(&fitted.trees, row, fitted.sample_size))
            .collect())
    }

    fn classify(&self, batch: ArrayView2<f64>) -> Result<Vec<Label>> {
        let fitted = self.fitted(batch)?;
        Ok(batch
            .outer_iter()
            .map(|row| {
                if anomaly_score(&fitted.trees, row, fitted.sample_size) > fitted.threshold {
                    Label::Anomalous
                } else {
                    Label::Normal
                }
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn build_tree(
    data: ArrayView2<f64>,
    rows: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    let size = rows.len();
    if size <= 1 || depth >= height_limit {
        return Node::Leaf { size };
    }

    let feature = rng.gen_range(0..data.ncols());
    let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
        let v = data[[r, feature]];
        (lo.min(v), hi.max(v))
    });
    if max - min < 1e-10 {
        return Node::Leaf { size };
    }

    let value = min + rng.gen::<f64>() * (max - min);
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.iter().partition(|&&r| data[[r, feature]] < value);
    if left.is_empty() || right.is_empty() {
        return Node::Leaf { size };
    }

    Node::Split {
        feature,
        value,
        left: Box::new(build_tree(data, &left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, &right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, x: ArrayView1<f64>, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            value,
            left,
            right,
        } => {
            if x[*feature] < *value {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// `s(x) = 2^(-E[h(x)] / c(psi))`, in `(0, 1]`.
fn anomaly_score(trees: &[Node], x: ArrayView1<f64>, sample_size: usize) -> f64 {
    let normalizer = average_path_length(sample_size);
    if normalizer <= 0.0 || trees.is_empty() {
        return 0.5;
    }
    let mean_depth =
        trees.iter().map(|t| path_length(t, x, 0)).sum::<f64>() / trees.len() as f64;
    2f64.powf(-mean_depth / normalizer)
}

/// Average unsuccessful-search path length of a BST with `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolation quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
