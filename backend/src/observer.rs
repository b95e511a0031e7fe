//! Hook points the prediction service calls while it works through a request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use inferences::{Encoded, FeatureFrame};
use log::{debug, error, info};
use ndarray::Array2;
use serde::Serialize;

use crate::error::{ErrorCategory, PredictionError};
use crate::models::PredictionRequest;

/// Receives the diagnostic trace of each prediction. All hooks default to
/// doing nothing; implementations must not block.
pub trait PredictionObserver: Send + Sync {
    fn on_request(&self, _request: &PredictionRequest) {}

    fn pre_preprocess(&self, _frame: &FeatureFrame) {}

    fn post_preprocess(&self, _encoded: &Encoded) {}

    fn post_densify(&self, _dense: &Array2<f64>) {}

    fn post_score(&self, _prediction: f64) {}

    fn on_error(&self, _error: &PredictionError) {}
}

pub struct NoopObserver;

impl PredictionObserver for NoopObserver {}

/// Writes the trace through the `log` facade.
pub struct LogObserver;

impl PredictionObserver for LogObserver {
    fn on_request(&self, request: &PredictionRequest) {
        debug!("Raw input data: {:?}", request);
    }

    fn pre_preprocess(&self, frame: &FeatureFrame) {
        debug!("Input frame:\n{}", frame);
    }

    fn post_preprocess(&self, encoded: &Encoded) {
        let (rows, cols) = encoded.shape();
        match encoded {
            Encoded::Sparse(m) => debug!(
                "Preprocessed input: sparse {}x{} with {} stored values",
                rows,
                cols,
                m.nnz()
            ),
            Encoded::Dense(_) => debug!("Preprocessed input: dense {}x{}", rows, cols),
        }
    }

    fn post_densify(&self, dense: &Array2<f64>) {
        debug!("Preprocessed dense input:\n{}", dense);
    }

    fn post_score(&self, prediction: f64) {
        info!("Prediction: {}", prediction);
    }

    fn on_error(&self, err: &PredictionError) {
        error!("{:?} error during prediction: {}", err.category(), err);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub preprocessing_errors: u64,
    pub scoring_errors: u64,
    pub internal_errors: u64,
    pub rejected_payloads: u64,
}

/// Outcome counters behind `/api/stats`.
#[derive(Debug, Default)]
pub struct PredictionStats {
    requests: AtomicU64,
    successes: AtomicU64,
    preprocessing_errors: AtomicU64,
    scoring_errors: AtomicU64,
    internal_errors: AtomicU64,
    rejected_payloads: AtomicU64,
}

impl PredictionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload refused by validation, so the service never saw it.
    pub fn record_rejected(&self) {
        self.rejected_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, category: ErrorCategory) {
        let counter = match category {
            ErrorCategory::Preprocessing => &self.preprocessing_errors,
            ErrorCategory::Scoring => &self.scoring_errors,
            ErrorCategory::Internal => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            preprocessing_errors: self.preprocessing_errors.load(Ordering::Relaxed),
            scoring_errors: self.scoring_errors.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            rejected_payloads: self.rejected_payloads.load(Ordering::Relaxed),
        }
    }
}

impl PredictionObserver for PredictionStats {
    fn on_request(&self, _request: &PredictionRequest) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn post_score(&self, _prediction: f64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    fn on_error(&self, err: &PredictionError) {
        self.record_error(err.category());
    }
}

/// Forwards every hook to each inner observer in order.
#[derive(Default, Clone)]
pub struct Observers(Vec<Arc<dyn PredictionObserver>>);

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn PredictionObserver>) -> Self {
        self.0.push(observer);
        self
    }
}

impl PredictionObserver for Observers {
    fn on_request(&self, request: &PredictionRequest) {
        self.0.iter().for_each(|o| o.on_request(request));
    }

    fn pre_preprocess(&self, frame: &FeatureFrame) {
        self.0.iter().for_each(|o| o.pre_preprocess(frame));
    }

    fn post_preprocess(&self, encoded: &Encoded) {
        self.0.iter().for_each(|o| o.post_preprocess(encoded));
    }

    fn post_densify(&self, dense: &Array2<f64>) {
        self.0.iter().for_each(|o| o.post_densify(dense));
    }

    fn post_score(&self, prediction: f64) {
        self.0.iter().for_each(|o| o.post_score(prediction));
    }

    fn on_error(&self, err: &PredictionError) {
        self.0.iter().for_each(|o| o.on_error(err));
    }
}
