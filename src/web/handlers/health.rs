// GET /health: readiness probe.
//
// Always 200. Callers poll `modelos_listos` until it turns true; a warm-up
// that failed reports `status: "failed"` and never becomes ready.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::moderation::readiness::WarmupState;
use crate::web::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let readiness = state.service.readiness();
    let status = match readiness.state() {
        WarmupState::Ready => "ready",
        WarmupState::Failed => "failed",
        WarmupState::Initializing | WarmupState::Warming => "initializing",
    };

    Json(serde_json::json!({
        "status": status,
        "modelos_listos": readiness.ready(),
        "inicializacion_en_curso": readiness.is_warming(),
        "timestamp": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
    }))
}
