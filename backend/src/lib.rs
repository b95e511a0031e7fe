//! Car price prediction service.
//!
//! `POST /predict` validates a car description, runs it through the shared
//! scoring pipeline and answers `{"prediction": price}` or `{"error": msg}`.
//! Domain failures keep status 200; only payload shape tells them apart.

pub mod config;
pub mod error;
pub mod form;
pub mod inference;
pub mod logging;
pub mod models;
pub mod observer;
pub mod routes;
pub mod validation;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
pub use error::{ErrorCategory, PredictionError, PredictionResult};
pub use inference::PredictionService;
pub use models::{PredictionRequest, PredictionResponse, FEATURE_COLUMNS};
pub use routes::{configure_routes, json_config, AppState};
pub use validation::{RequestValidator, ValidationError};
