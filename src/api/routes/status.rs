//! Polling endpoints.
//!
//! - GET /status/db
//! - GET /status/uploads
//! - GET /status/recordings
//! - GET /status/capabilities

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

use super::ApiState;
use crate::api::error::ApiResult;
use crate::index::{Capabilities, IndexStatus, UploadsStatus};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/db", get(db_status))
        .route("/uploads", get(uploads_status))
        .route("/recordings", get(recordings_status))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

async fn db_status(State(state): State<ApiState>) -> Json<IndexStatus> {
    Json(state.status.db_status().await)
}

async fn uploads_status(State(state): State<ApiState>) -> ApiResult<Json<UploadsStatus>> {
    Ok(Json(state.status.uploads().await?))
}

async fn recordings_status(State(state): State<ApiState>) -> Json<Value> {
    match state.status.last_report().await {
        Some(report) => Json(json!({
            "generation": report.generation,
            "source": report.source,
            "started_at": report.started_at,
            "finished_at": report.finished_at,
            "succeeded": report.succeeded(),
            "failed": report.failed(),
            "skipped": report.skipped(),
            "recordings": report.recordings,
        })),
        None => Json(json!({
            "generation": null,
            "recordings": [],
        })),
    }
}

async fn capabilities(State(state): State<ApiState>) -> Json<Capabilities> {
    Json(state.status.capabilities().clone())
}
