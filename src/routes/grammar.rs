use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/introduce", post(introduce_feature))
        .route("/confused", get(confused_features))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntroduceRequest {
    feature_key: String,
}

/// Mark a grammar feature as introduced (just-in-time lesson shown).
async fn introduce_feature(
    State(state): State<AppState>,
    Json(body): Json<IntroduceRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let now = Utc::now();
    state.engine().introduce_feature(&body.feature_key, now)?;
    state.store().log_interaction(
        "grammar_feature_introduced",
        serde_json::json!({"featureKey": body.feature_key}),
    )?;
    Ok(ok(serde_json::json!({
        "featureKey": body.feature_key,
        "introducedAt": now,
    })))
}

/// Features whose confusion rate crossed the resurfacing threshold.
async fn confused_features(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let confused = state.engine().confused_features()?;
    Ok(ok(serde_json::json!({ "featureKeys": confused })))
}
