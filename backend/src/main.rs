use actix_cors::Cors;
use actix_files::Files;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::{error, info};

use backend::{configure_routes, json_config, logging, routes, AppState, ServerConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    logging::init(config.log_file.as_deref())?;

    info!("Starting car price prediction service");

    let state = match AppState::from_config(&config) {
        Ok(state) => {
            info!("Model loaded successfully from {}", config.model_path.display());
            state
        }
        Err(e) => {
            error!("Failed to load model: {}", e);
            return Err(e).context(
                "Failed to load model pipeline. Ensure the artifact is valid and correctly configured.",
            );
        }
    };
    let state = web::Data::new(state);

    let bind_address = config.bind_address();
    info!("Listening on http://{}", bind_address);
    info!("Workers: {}", config.workers);
    info!("Endpoints:");
    info!("   POST /predict           - price prediction");
    info!("   GET  /api/health        - liveness");
    info!("   GET  /api/model-info    - pipeline metadata");
    info!("   GET  /api/stats         - outcome counters");
    info!("   GET  /api/form-options  - client form catalog");
    info!("   GET  /                  - client form");

    let origins = config.cors_origins.clone();
    let static_dir = config.static_dir.clone();
    let json_limit = config.json_limit;

    HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors)
            .app_data(state.clone())
            .app_data(json_config(json_limit))
            .configure(configure_routes)
            .service(Files::new("/static", static_dir.clone()).prefer_utf8(true))
            .default_service(web::route().to(routes::not_found))
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
