//! Index lifecycle endpoints.
//!
//! - POST /db/index - start a build/update (202, or 409 while one runs)
//! - POST /db/query - query the committed index

use axum::{
    body::Bytes, extract::State, http::StatusCode, response::Json, routing::post, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::ApiState;
use crate::api::error::ApiResult;
use crate::index::{IndexError, IndexRequest, QueryAnswer};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/db/index", post(request_index))
        .route("/db/query", post(query_index))
        .with_state(state)
}

async fn request_index(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = parse_index_request(&body)?;
    info!("Index request received via API: {:?}", request);

    let accepted = state.orchestrator.request_build_or_update(request).await?;
    let status = state.status.db_status().await;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "accepted": true,
            "generation": accepted.generation,
            "source": accepted.source,
            "state": status.state,
            "message": status.message,
        })),
    ))
}

/// An empty body selects the defaults; anything else must parse.
fn parse_index_request(body: &[u8]) -> Result<IndexRequest, IndexError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(IndexRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| IndexError::InvalidRequest(format!("malformed index request: {}", e)))
}

async fn query_index(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryAnswer>> {
    let answer = state.orchestrator.query(&request.query).await?;
    Ok(Json(answer))
}
