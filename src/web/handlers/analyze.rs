// POST /analyze: moderate one image by path.
//
// Checks run in order: readiness (503), body (400), path (404). Only then
// does the request enter the pipeline. The pipeline itself runs in its own
// task so a panic anywhere inside it becomes a 500 fail-closed envelope
// instead of a dropped connection.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info, warn};

use crate::web::dto::{AnalyzeRequest, AnalyzeResponse};
use crate::web::paths::{resolve_image_path, Resolved};
use crate::web::{api_error, fail_closed_error, AppState};

pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    if !state.service.ready() {
        return fail_closed_error(StatusCode::SERVICE_UNAVAILABLE, "models unavailable");
    }

    let requested = match body {
        Ok(Json(AnalyzeRequest {
            image_path: Some(path),
        })) if !path.trim().is_empty() => path,
        Ok(_) => return api_error(StatusCode::BAD_REQUEST, "No image_path provided"),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected /analyze body");
            return api_error(StatusCode::BAD_REQUEST, "No JSON data");
        }
    };

    let path = match resolve_image_path(&requested, &state.config.image_root) {
        Resolved::Found(path) => path,
        Resolved::Missing(tried) => {
            warn!(requested = %requested, resolved = %tried.display(), "Image not found");
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": format!("image not found: {}", tried.display()),
                    "ruta_solicitada": requested,
                    "ruta_resuelta": tried.display().to_string(),
                    "es_apto": false,
                    "puntuacion_riesgo": 1.0,
                })),
            )
                .into_response();
        }
    };

    info!(image = %path.display(), "Analyzing image");

    let service = state.service.clone();
    let task_path = path.clone();
    let report = match tokio::spawn(async move { service.moderate(&task_path).await }).await {
        Ok(report) => report,
        Err(e) => {
            error!(image = %path.display(), error = %e, "Moderation task failed");
            return fail_closed_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    let response = AnalyzeResponse::from_report(
        &report,
        &state.service.policy().thresholds,
        &path.display().to_string(),
    );
    Json(response).into_response()
}
