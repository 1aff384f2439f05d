use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/acquisition", get(acquisition_stats))
        .route("/knowledge", get(knowledge_stats))
        .route("/events", get(recent_events))
}

async fn acquisition_stats(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let stats = state.engine().acquisition_stats(Utc::now())?;
    Ok(ok(stats))
}

async fn knowledge_stats(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let stats = state.store().knowledge_stats()?;
    Ok(ok(stats))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(50).min(500);
    let events = state.store().recent_interactions(limit)?;
    Ok(ok(events))
}
