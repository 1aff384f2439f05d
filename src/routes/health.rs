use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

pub async fn health_check(
    State(state): State<AppState>,
) -> impl axum::response::IntoResponse {
    let stats = state.store().knowledge_stats().unwrap_or_default();
    let active_sentences = state.store().count_active_sentences().unwrap_or(0);
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "workerLeader": state.config().worker.is_leader,
        "store": {
            "healthy": true,
            "activeSentences": active_sentences,
            "acquiring": stats.acquiring,
            "learning": stats.learning,
            "known": stats.known,
        }
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.store().get_lemma("__health_check__").is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
