use crate::error::{DetectorError, Result};
use crate::models::base_model::Projector;
use ndarray::{Array1, Array2, ArrayView2, Axis};

const POWER_ITERATIONS: usize = 500;
const CONVERGENCE_TOL: f64 = 1e-12;

/// Running first and second moments of the rows seen so far.
#[derive(Debug, Clone)]
struct Moments {
    n: usize,
    mean: Array1<f64>,
    scatter: Array2<f64>,
}

impl Moments {
    fn from_batch(batch: ArrayView2<f64>) -> Option<Self> {
        let mean = batch.mean_axis(Axis(0))?;
        let centered = &batch - &mean;
        let scatter = centered.t().dot(&centered);
        Some(Self {
            n: batch.nrows(),
            mean,
            scatter,
        })
    }

    /// Chan et al. pairwise update.
    fn merge(self, other: Moments) -> Moments {
        let (na, nb) = (self.n as f64, other.n as f64);
        let n = na + nb;
        let delta = &other.mean - &self.mean;
        let d = delta.len();
        let outer = Array2::from_shape_fn((d, d), |(i, j)| delta[i] * delta[j]);
        Moments {
            n: self.n + other.n,
            mean: &self.mean + &(&delta * (nb / n)),
            scatter: &self.scatter + &other.scatter + &(outer * (na * nb / n)),
        }
    }

    fn covariance(&self) -> Array2<f64> {
        let dof = if self.n > 1 { (self.n - 1) as f64 } else { 1.0 };
        &self.scatter / dof
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    moments: Moments,
    components: Array2<f64>,
    explained_variance: Array1<f64>,
}

/// Incremental principal component projector.
///
/// Rows are streamed through `partial_fit` in chunks of `batch_size`, merging
/// mean and scatter statistics, so memory stays `O(d^2)` regardless of how many
/// rows have been seen. Components are the leading covariance eigenvectors,
/// found by power iteration with deflation and sign-normalised so the
/// largest-magnitude coefficient is positive.
#[derive(Debug, Clone)]
pub struct IncrementalPca {
    n_components: usize,
    batch_size: Option<usize>,
    fitted: Option<Fitted>,
}

impl IncrementalPca {
    pub fn new(n_components: usize) -> Result<Self> {
        if n_components == 0 {
            return Err(DetectorError::InvalidConfiguration(
                "n_components must be a positive integer".into(),
            ));
        }
        Ok(Self {
            n_components,
            batch_size: None,
            fitted: None,
        })
    }

    /// Chunk size used by `fit`. Defaults to `5 * n_features`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    /// Merge `batch` into the current statistics and recompute components.
    pub fn partial_fit(&mut self, batch: ArrayView2<f64>) -> Result<()> {
        self.check_batch(batch, self.n_features())?;
        let incoming = Moments::from_batch(batch).ok_or(DetectorError::EmptyBatch {
            component: "projector",
        })?;
        let moments = match &self.fitted {
            Some(f) => f.moments.clone().merge(incoming),
            None => incoming,
        };
        self.fitted = Some(self.finish(moments)?);
        Ok(())
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_features(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.moments.mean.len())
    }

    pub fn n_samples_seen(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.moments.n)
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.moments.mean)
    }

    /// `(n_components, n_features)` matrix of principal axes.
    pub fn components(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().map(|f| &f.components)
    }

    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.explained_variance)
    }

    /// Shape checks shared by `fit` and `partial_fit`. `expected` pins the
    /// feature count when merging into existing statistics.
    fn check_batch(&self, batch: ArrayView2<f64>, expected: Option<usize>) -> Result<()> {
        if batch.nrows() == 0 {
            return Err(DetectorError::EmptyBatch {
                component: "projector",
            });
        }
        if self.n_components > batch.ncols() {
            return Err(DetectorError::InvalidConfiguration(format!(
                "n_components={} exceeds n_features={}",
                self.n_components,
                batch.ncols()
            )));
        }
        if let Some(expected) = expected {
            if batch.ncols() != expected {
                return Err(DetectorError::DimensionMismatch {
                    expected,
                    got: batch.ncols(),
                });
            }
        }
        Ok(())
    }

    fn finish(&self, moments: Moments) -> Result<Fitted> {
        let covariance = moments.covariance();
        if !all_finite(moments.mean.iter().chain(covariance.iter())) {
            return Err(DetectorError::NonFiniteFit {
                component: "projector",
            });
        }
        let (components, explained_variance) =
            leading_eigenvectors(&covariance, self.n_components);
        if !all_finite(components.iter().chain(explained_variance.iter())) {
            return Err(DetectorError::NonFiniteFit {
                component: "projector",
            });
        }
        Ok(Fitted {
            moments,
            components,
            explained_variance,
        })
    }
}

impl Projector for IncrementalPca {
    fn fit(&mut self, batch: ArrayView2<f64>) -> Result<()> {
        self.check_batch(batch, None)?;
        let chunk = self.batch_size.unwrap_or(5 * batch.ncols());
        let mut moments: Option<Moments> = None;
        for rows in batch.axis_chunks_iter(Axis(0), chunk) {
            if let Some(incoming) = Moments::from_batch(rows) {
                moments = Some(match moments {
                    Some(m) => m.merge(incoming),
                    None => incoming,
                });
            }
        }
        let moments = moments.ok_or(DetectorError::EmptyBatch {
            component: "projector",
        })?;
        let fitted = self.finish(moments)?;
        self.fitted = Some(fitted);
        Ok(())
    }

    fn transform(&self, batch: ArrayView2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted.as_ref().ok_or(DetectorError::UninitializedModel {
            component: "projector",
        })?;
        let expected = fitted.moments.mean.len();
        if batch.ncols() != expected {
            return Err(DetectorError::DimensionMismatch {
                expected,
                got: batch.ncols(),
            });
        }
        let centered = &batch - &fitted.moments.mean;
        Ok(centered.dot(&fitted.components.t()))
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|x| x.is_finite())
}

fn leading_eigenvectors(cov: &Array2<f64>, k: usize) -> (Array2<f64>, Array1<f64>) {
    let d = cov.nrows();
    let mut work = cov.clone();
    let mut components = Array2::zeros((k, d));
    let mut variances = Array1::zeros(k);

    for c in 0..k {
        let start = (0..d)
            .max_by(|&a, &b| work[[a, a]].total_cmp(&work[[b, b]]))
            .unwrap_or(0);
        let mut v = Array1::<f64>::zeros(d);
        v[start] = 1.0;

        for _ in 0..POWER_ITERATIONS {
            let next = work.dot(&v);
            let norm = next.dot(&next).sqrt();
            if norm < CONVERGENCE_TOL {
                break;
            }
            let next = next / norm;
            let step: f64 = (&next - &v).mapv(f64::abs).sum();
            v = next;
            if step < CONVERGENCE_TOL {
                break;
            }
        }

        let pivot = v
            .iter()
            .copied()
            .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.mapv_inplace(|x| -x);
        }

        let lambda = v.dot(&work.dot(&v));
        for i in 0..d {
            for j in 0..d {
                work[[i, j]] -= lambda * v[i] * v[j];
            }
        }
        components.row_mut(c).assign(&v);
        variances[c] = lambda.max(0.0);
    }

    (components, variances)
}
