// Web server: Axum-based moderation API.
//
// Two working routes: GET /health for readiness polling and POST /analyze
// for moderating an image by path. The server starts listening before the
// models finish loading; until then /analyze answers 503.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::moderation::service::ModerationService;

pub mod dto;
pub mod handlers;
pub mod paths;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ModerationService,
    pub config: Arc<Config>,
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(
    config: Config,
    service: ModerationService,
    port: u16,
    bind: &str,
) -> Result<()> {
    let state = AppState {
        service,
        config: Arc::new(config),
    };

    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("Lookout moderation API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(handlers::health::health))
        .route("/analyze", post(handlers::analyze::analyze))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Service banner with the endpoint list.
async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.service.ready();
    let status = if ready { "running" } else { "starting" };
    Json(serde_json::json!({
        "message": "Lookout image moderation server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": status,
        "modelos_cargados": ready,
        "endpoints": {
            "GET /health": "Server and model status",
            "POST /analyze": "Moderate an image (JSON: {image_path: \"path\"})",
        },
    }))
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Error envelope that still carries a rejecting verdict, for callers that
/// only read `es_apto`.
pub fn fail_closed_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "es_apto": false,
            "puntuacion_riesgo": 1.0,
        })),
    )
        .into_response()
}
