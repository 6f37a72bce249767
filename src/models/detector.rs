use crate::config::DetectorConfig;
use crate::error::{DetectorError, Result};
use crate::models::base_model::{column, Label, Projector, Scorer};
use crate::models::iforest::IsolationForest;
use crate::models::ipca::IncrementalPca;
use crate::models::window::WindowBuffer;
use ndarray::ArrayView2;
use tracing::{debug, trace};

/// Lifecycle of a [`StreamDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No successful `initial_fit` yet; `detect` fails.
    Uninitialized,
    /// Models fitted, buffer still warming up.
    Seeded,
    /// At least one full-window detection (and retrain) has happened.
    Operating,
}

/// Windowed streaming anomaly detector.
///
/// Buffers the most recent `window_size` observations, projects them, scores
/// them and, once the window is full, retrains both models on the current
/// window after every `retrain_interval` detections (every call by default).
pub struct StreamDetector<P = IncrementalPca, S = IsolationForest> {
    config: DetectorConfig,
    buffer: WindowBuffer,
    projector: P,
    scorer: S,
    state: DetectorState,
    full_window_detections: usize,
    retrain_count: usize,
}

impl StreamDetector {
    /// Detector with default hyperparameters and the given window.
    pub fn new(window_size: usize) -> Result<Self> {
        Self::with_config(DetectorConfig::with_window(window_size))
    }

    pub fn with_config(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let projector = IncrementalPca::new(config.n_components)?;
        let scorer = IsolationForest::new(
            config.n_estimators,
            config.max_samples,
            config.sensitivity,
            config.seed,
        )?;
        Self::with_models(config, projector, scorer)
    }
}

impl<P: Projector + Clone, S: Scorer> StreamDetector<P, S> {
    /// Detector around caller-supplied models. Both are refitted by
    /// `initial_fit`, so any prior state they carry is discarded.
    pub fn with_models(config: DetectorConfig, projector: P, scorer: S) -> Result<Self> {
        config.validate()?;
        let buffer = WindowBuffer::new(config.window_size)?;
        Ok(Self {
            config,
            buffer,
            projector,
            scorer,
            state: DetectorState::Uninitialized,
            full_window_detections: 0,
            retrain_count: 0,
        })
    }

    /// Seed both models from a historical batch of at least `window_size` points.
    pub fn initial_fit(&mut self, batch: &[f64]) -> Result<()> {
        let needed = self.config.window_size;
        if batch.len() < needed {
            return Err(DetectorError::InsufficientInitialData {
                needed,
                got: batch.len(),
            });
        }
        if let Some(&value) = batch.iter().find(|x| !x.is_finite()) {
            return Err(DetectorError::InvalidDataPoint { value });
        }

        self.refit(column(batch).view())?;
        if self.state == DetectorState::Uninitialized {
            self.state = DetectorState::Seeded;
        }
        debug!(
            points = batch.len(),
            window_size = needed,
            "seeded stream detector"
        );
        Ok(())
    }

    /// Push one observation and label it.
    ///
    /// Returns `Normal` while the buffer is warming up. Once the window is
    /// full the newest point is classified against the current models, which
    /// are then retrained on the window. On error the detector is left exactly
    /// as it was before the call.
    pub fn detect(&mut self, value: f64) -> Result<Label> {
        if !value.is_finite() {
            return Err(DetectorError::InvalidDataPoint { value });
        }
        if self.state == DetectorState::Uninitialized {
            return Err(DetectorError::UninitializedModel {
                component: "stream detector",
            });
        }

        self.buffer.push(value);
        if !self.buffer.is_full() {
            trace!(value, buffered = self.buffer.len(), "warming up");
            return Ok(Label::Normal);
        }

        match self.detect_full_window() {
            Ok(label) => {
                trace!(value, label = label.as_u8(), "classified");
                Ok(label)
            }
            Err(e) => {
                self.buffer.pop_latest();
                Err(e)
            }
        }
    }

    /// `detect` over a slice, stopping at the first error.
    pub fn detect_batch(&mut self, values: &[f64]) -> Result<Vec<Label>> {
        values.iter().map(|&v| self.detect(v)).collect()
    }

    fn detect_full_window(&mut self) -> Result<Label> {
        let window = column(&self.buffer.last_n(self.config.window_size)?);
        let reduced = self.projector.transform(window.view())?;
        let label = self
            .scorer
            .classify(reduced.view())?
            .last()
            .copied()
            .ok_or(DetectorError::EmptyBatch { component: "scorer" })?;

        if self.full_window_detections % self.config.retrain_interval == 0 {
            self.refit(window.view())?;
            self.retrain_count += 1;
            debug!(
                retrain_count = self.retrain_count,
                window_size = self.config.window_size,
                "retrained on current window"
            );
        }

        self.buffer.truncate_to_capacity();
        self.full_window_detections += 1;
        self.state = DetectorState::Operating;
        Ok(label)
    }

    /// Full refit of projector then scorer. The previous projector is restored
    /// if any step fails; the scorer only commits on success.
    fn refit(&mut self, raw: ArrayView2<f64>) -> Result<()> {
        let previous = self.projector.clone();
        let outcome = self
            .projector
            .fit_transform(raw)
            .and_then(|reduced| self.scorer.fit(reduced.view()));
        if outcome.is_err() {
            self.projector = previous;
        }
        outcome
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Buffered observations, oldest first.
    pub fn window(&self) -> Vec<f64> {
        self.buffer.iter().copied().collect()
    }

    /// Number of retrains performed by `detect` (seeding not included).
    pub fn retrain_count(&self) -> usize {
        self.retrain_count
    }

    pub fn projector(&self) -> &P {
        &self.projector
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn hourly(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * (i % 24) as f64 / 23.0).sin())
            .collect()
    }

    fn small_config(window_size: usize) -> DetectorConfig {
        DetectorConfig {
            window_size,
            n_estimators: 25,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(matches!(
            StreamDetector::new(0),
            Err(DetectorError::InvalidConfiguration(_))
        ));
        assert!(StreamDetector::new(1).is_ok());
    }

    #[test]
    fn short_initial_batch_is_rejected() {
        let mut detector = StreamDetector::new(24).unwrap();
        let err = detector.initial_fit(&hourly(23)).unwrap_err();
        assert!(matches!(
            err,
            DetectorError::InsufficientInitialData { needed: 24, got: 23 }
        ));
        assert_eq!(detector.state(), DetectorState::Uninitialized);

        detector.initial_fit(&hourly(24)).unwrap();
        assert_eq!(detector.state(), DetectorState::Seeded);
    }

    #[test]
    fn detect_before_seeding_fails_without_buffering() {
        let mut detector = StreamDetector::new(4).unwrap();
        for _ in 0..6 {
            let err = detector.detect(1.0).unwrap_err();
            assert!(matches!(err, DetectorError::UninitializedModel { .. }));
        }
        assert_eq!(detector.buffer_len(), 0);
    }

    #[test]
    fn warm_up_labels_are_normal() {
        let mut detector = StreamDetector::with_config(small_config(8)).unwrap();
        detector.initial_fit(&hourly(24)).unwrap();
        for x in [0.0, 100.0, -50.0, 1e6, 3.0, 2.0, 1.0] {
            assert_eq!(detector.detect(x).unwrap(), Label::Normal);
        }
        assert_eq!(detector.state(), DetectorState::Seeded);
        assert_eq!(detector.retrain_count(), 0);
    }

    #[test]
    fn full_window_detection_retrains_every_call() {
        let mut detector = StreamDetector::with_config(small_config(6)).unwrap();
        detector.initial_fit(&hourly(24)).unwrap();

        let stream = hourly(20);
        for (i, &x) in stream.iter().enumerate() {
            detector.detect(x).unwrap();
            assert!(detector.buffer_len() <= 6);
            let expected = (i + 1).saturating_sub(5);
            assert_eq!(detector.retrain_count(), expected);
        }
        assert_eq!(detector.state(), DetectorState::Operating);
        assert_eq!(detector.window(), stream[14..].to_vec());
    }

    #[test]
    fn retrain_replaces_projector_parameters() {
        let mut detector = StreamDetector::with_config(small_config(4)).unwrap();
        detector.initial_fit(&hourly(24)).unwrap();
        let seeded_mean = detector.projector().mean().unwrap()[0];

        for x in [10.0, 11.0, 12.0, 13.0] {
            detector.detect(x).unwrap();
        }
        let mean = detector.projector().mean().unwrap()[0];
        assert!((mean - 11.5).abs() < 1e-12);
        assert!((mean - seeded_mean).abs() > 1.0);
        assert_eq!(detector.projector().n_samples_seen(), 4);
    }

    #[test]
    fn retrain_interval_spaces_out_refits() {
        let config = DetectorConfig {
            retrain_interval: 3,
            ..small_config(4)
        };
        let mut detector = StreamDetector::with_config(config).unwrap();
        detector.initial_fit(&hourly(24)).unwrap();
        detector.detect_batch(&hourly(12)).unwrap();
        // Nine full-window detections: retrains on the 1st, 4th and 7th.
        assert_eq!(detector.retrain_count(), 3);
    }

    #[test]
    fn invalid_point_leaves_state_untouched() {
        let mut detector = StreamDetector::with_config(small_config(4)).unwrap();
        detector.initial_fit(&hourly(24)).unwrap();
        detector.detect_batch(&[0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();

        let window = detector.window();
        let retrains = detector.retrain_count();
        let mean = detector.projector().mean().cloned();
        let threshold = detector.scorer().threshold();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = detector.detect(bad).unwrap_err();
            assert!(matches!(err, DetectorError::InvalidDataPoint { .. }));
        }
        assert_eq!(detector.window(), window);
        assert_eq!(detector.retrain_count(), retrains);
        assert_eq!(detector.projector().mean().cloned(), mean);
        assert_eq!(detector.scorer().threshold(), threshold);

        assert!(detector.detect(0.6).is_ok());
    }

    #[test]
    fn overflowing_window_is_rejected_and_rolled_back() {
        let mut detector = StreamDetector::with_config(small_config(4)).unwrap();
        let err = detector
            .initial_fit(&[1e200, -1e200, 1e200, -1e200])
            .unwrap_err();
        assert!(matches!(err, DetectorError::NonFiniteFit { .. }));
        assert_eq!(detector.state(), DetectorState::Uninitialized);

        detector.initial_fit(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        detector.detect_batch(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let window = detector.window();
        let retrains = detector.retrain_count();
        let mean = detector.projector().mean().cloned();

        let err = detector.detect(1e200).unwrap_err();
        assert!(matches!(err, DetectorError::NonFiniteFit { .. }));
        assert_eq!(detector.window(), window);
        assert_eq!(detector.retrain_count(), retrains);
        assert_eq!(detector.projector().mean().cloned(), mean);
        assert!(detector.detect(2.5).is_ok());
    }

    #[test]
    fn non_finite_seed_batch_is_rejected() {
        let mut detector = StreamDetector::new(2).unwrap();
        let err = detector.initial_fit(&[1.0, f64::NAN, 2.0]).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidDataPoint { .. }));
        assert_eq!(detector.state(), DetectorState::Uninitialized);
    }

    #[derive(Clone)]
    struct Identity {
        fitted: bool,
    }

    impl Projector for Identity {
        fn fit(&mut self, _batch: ArrayView2<f64>) -> Result<()> {
            self.fitted = true;
            Ok(())
        }

        fn transform(&self, batch: ArrayView2<f64>) -> Result<Array2<f64>> {
            Ok(batch.to_owned())
        }

        fn is_fitted(&self) -> bool {
            self.fitted
        }
    }

    /// Flags anything above a fixed cut-off, fails to refit on demand.
    struct Cutoff {
        fits: usize,
        fail_after: usize,
    }

    impl Scorer for Cutoff {
        fn fit(&mut self, _batch: ArrayView2<f64>) -> Result<()> {
            if self.fits >= self.fail_after {
                return Err(DetectorError::EmptyBatch { component: "scorer" });
            }
            self.fits += 1;
            Ok(())
        }

        fn score(&self, batch: ArrayView2<f64>) -> Result<Vec<f64>> {
            Ok(batch.column(0).to_vec())
        }

        fn classify(&self, batch: ArrayView2<f64>) -> Result<Vec<Label>> {
            Ok(self
                .score(batch)?
                .into_iter()
                .map(|s| if s > 5.0 { Label::Anomalous } else { Label::Normal })
                .collect())
        }

        fn is_fitted(&self) -> bool {
            self.fits > 0
        }
    }

    #[test]
    fn custom_models_plug_in() {
        let scorer = Cutoff {
            fits: 0,
            fail_after: usize::MAX,
        };
        let mut detector =
            StreamDetector::with_models(DetectorConfig::with_window(3), Identity { fitted: false }, scorer)
                .unwrap();
        detector.initial_fit(&[0.0, 1.0, 2.0]).unwrap();
        let labels: Vec<u8> = detector
            .detect_batch(&[1.0, 1.0, 9.0, 1.0])
            .unwrap()
            .into_iter()
            .map(Label::as_u8)
            .collect();
        assert_eq!(labels, vec![0, 0, 1, 0]);
        assert!(detector.projector().is_fitted());
    }

    #[test]
    fn failed_retrain_rolls_back_the_push() {
        // Seed fit plus one retrain succeed; the second retrain fails.
        let scorer = Cutoff {
            fits: 0,
            fail_after: 2,
        };
        let mut detector =
            StreamDetector::with_models(DetectorConfig::with_window(2), Identity { fitted: false }, scorer)
                .unwrap();
        detector.initial_fit(&[0.0, 1.0]).unwrap();
        detector.detect(1.0).unwrap();
        detector.detect(2.0).unwrap();
        assert_eq!(detector.retrain_count(), 1);

        let window = detector.window();
        assert!(detector.detect(3.0).is_err());
        assert_eq!(detector.window(), window);
        assert_eq!(detector.retrain_count(), 1);
    }
}
