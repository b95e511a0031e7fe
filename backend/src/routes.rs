use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use actix_files::NamedFile;
use actix_web::error::JsonPayloadError;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use inferences::{Pipeline, StartupError};
use log::{error, info, warn};
use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::PredictionError;
use crate::form::FormOptions;
use crate::inference::PredictionService;
use crate::models::{ApiResponse, PredictionResponse};
use crate::observer::{LogObserver, Observers, PredictionStats};
use crate::validation::{RequestValidator, ValidationError};

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub stats: Arc<PredictionStats>,
    pub static_dir: PathBuf,
    pub started: Instant,
}

impl AppState {
    pub fn new(service: PredictionService, stats: Arc<PredictionStats>, static_dir: PathBuf) -> Self {
        Self {
            service: Arc::new(service),
            stats,
            static_dir,
            started: Instant::now(),
        }
    }

    /// Load the pipeline and wire the observers. Fails before any socket is
    /// bound when the artifact is unusable.
    pub fn from_config(config: &ServerConfig) -> Result<Self, StartupError> {
        let pipeline = Pipeline::load(&config.model_path)?;
        let stats = Arc::new(PredictionStats::new());
        let observers = Observers::new()
            .with(Arc::new(LogObserver))
            .with(stats.clone());
        let service = PredictionService::new(Arc::new(pipeline), Arc::new(observers));
        Ok(Self::new(service, stats, config.static_dir.clone()))
    }
}

/// JSON extractor settings for `/predict`. Bodies that are not JSON at all
/// become a 400 before any handler runs.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err: JsonPayloadError, req: &HttpRequest| {
            warn!("Rejected malformed payload on {}: {}", req.path(), err);
            if let Some(state) = req.app_data::<web::Data<AppState>>() {
                state.stats.record_rejected();
            }
            ValidationError::Malformed(err.to_string()).into()
        })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(predict)
        .service(health_check)
        .service(model_info)
        .service(prediction_stats)
        .service(form_options)
        .service(index);
}

#[post("/predict")]
pub async fn predict(
    state: web::Data<AppState>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ValidationError> {
    let request = RequestValidator::validate(&payload).map_err(|e| {
        warn!("Validation failed: {}", e);
        state.stats.record_rejected();
        e
    })?;

    let service = state.service.clone();
    let result = match web::block(move || service.predict(&request)).await {
        Ok(result) => result,
        Err(e) => {
            error!("Blocking pool failure during prediction: {}", e);
            let err = PredictionError::Internal(e.to_string());
            state.stats.record_error(err.category());
            Err(err)
        }
    };

    Ok(HttpResponse::Ok().json(PredictionResponse::from(result)))
}

#[get("/api/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
    })))
}

#[get("/api/model-info")]
pub async fn model_info(state: web::Data<AppState>) -> impl Responder {
    let started = Instant::now();
    let info = state.service.artifact_info();
    HttpResponse::Ok().json(ApiResponse::success(info).with_elapsed(started))
}

#[get("/api/stats")]
pub async fn prediction_stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(state.stats.snapshot()))
}

#[get("/api/form-options")]
pub async fn form_options() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(FormOptions::catalog()))
}

#[get("/")]
pub async fn index(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    match NamedFile::open_async(state.static_dir.join("index.html")).await {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            error!("Failed to load form page: {}", e);
            HttpResponse::InternalServerError().json(ApiResponse::<()>::error("Failed to load form page"))
        }
    }
}

pub async fn not_found(req: HttpRequest) -> HttpResponse {
    info!("No route for {} {}", req.method(), req.path());
    HttpResponse::NotFound().json(ApiResponse::<()>::error("Endpoint not found"))
}
