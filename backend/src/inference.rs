use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use inferences::{ArtifactInfo, ScoringArtifact};

use crate::error::{PredictionError, PredictionResult, STAGE_DENSIFY, STAGE_PREPROCESS, STAGE_SCORE};
use crate::models::PredictionRequest;
use crate::observer::PredictionObserver;

/// Runs a validated request through the shared scoring artifact.
///
/// Holds no mutable state: the same request always yields the same result.
/// Every failure is caught here and returned as a [`PredictionError`].
#[derive(Clone)]
pub struct PredictionService {
    artifact: Arc<dyn ScoringArtifact>,
    observer: Arc<dyn PredictionObserver>,
}

impl PredictionService {
    pub fn new(artifact: Arc<dyn ScoringArtifact>, observer: Arc<dyn PredictionObserver>) -> Self {
        Self { artifact, observer }
    }

    pub fn artifact_info(&self) -> ArtifactInfo {
        self.artifact.info()
    }

    pub fn predict(&self, request: &PredictionRequest) -> PredictionResult {
        self.observer.on_request(request);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(request)))
            .unwrap_or_else(|payload| Err(PredictionError::Internal(panic_message(payload))));

        if let Err(err) = &result {
            self.observer.on_error(err);
        }
        result
    }

    fn run_stages(&self, request: &PredictionRequest) -> PredictionResult {
        let frame = request
            .to_frame()
            .map_err(|e| PredictionError::Internal(e.to_string()))?;
        self.observer.pre_preprocess(&frame);

        let encoded = self
            .artifact
            .preprocess(&frame)
            .map_err(|e| PredictionError::from((STAGE_PREPROCESS, e)))?;
        self.observer.post_preprocess(&encoded);

        let dense = encoded
            .densify()
            .map_err(|e| PredictionError::from((STAGE_DENSIFY, e)))?;
        self.observer.post_densify(&dense);

        let scores = self
            .artifact
            .score(dense.view())
            .map_err(|e| PredictionError::from((STAGE_SCORE, e)))?;
        let price = match scores.first() {
            Some(price) if price.is_finite() => *price,
            Some(price) => {
                return Err(PredictionError::scoring(
                    STAGE_SCORE,
                    format!("model returned non-finite value {}", price),
                ))
            }
            None => return Err(PredictionError::scoring(STAGE_SCORE, "model returned no rows")),
        };

        self.observer.post_score(price);
        Ok(price)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "artifact panicked".to_string()
    }
}
