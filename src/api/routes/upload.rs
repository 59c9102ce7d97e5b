//! POST /upload - stage a video file for the next upload-sourced index run.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};

/// Multipart framing overhead allowed on top of the file limit.
const MULTIPART_SLACK_BYTES: u64 = 64 * 1024;

pub fn router(state: ApiState) -> Router {
    let body_limit = state
        .uploads
        .max_upload_bytes()
        .saturating_add(MULTIPART_SLACK_BYTES);

    Router::new()
        .route("/upload", post(upload_file))
        .layer(DefaultBodyLimit::max(
            usize::try_from(body_limit).unwrap_or(usize::MAX),
        ))
        .with_state(state)
}

async fn upload_file(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Upload is missing a file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

        info!("Upload received via API: {} ({} bytes)", file_name, bytes.len());

        let staging = state.uploads.clone();
        let record = tokio::task::spawn_blocking(move || staging.accept(&file_name, &bytes))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))??;

        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "accepted": true,
                "identity": record.identity,
                "size_bytes": record.size_bytes,
                "received_at": record.received_at,
            })),
        ));
    }

    Err(ApiError::bad_request("Multipart body has no 'file' field"))
}
