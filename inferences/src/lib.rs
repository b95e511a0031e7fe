//! Loader and interpreter for the serialized car price pipeline.
//!
//! The pipeline exposes two named steps, `preprocessor` and `model`, behind
//! the [`ScoringArtifact`] trait. Callers build a [`FeatureFrame`], run
//! [`ScoringArtifact::preprocess`], densify the [`Encoded`] output and hand
//! it to [`ScoringArtifact::score`].

pub mod artifact;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod preprocess;
pub mod regressor;
pub mod types;

pub use artifact::{ArtifactInfo, ScoringArtifact};
pub use error::{StageError, StartupError};
pub use pipeline::{Pipeline, MODEL, PREPROCESSOR};
pub use types::{Cell, CsrMatrix, Encoded, FeatureFrame};
