//! REST API server.
//!
//! Provides HTTP endpoints for:
//! - Starting index builds/updates and querying the index
//! - Uploading recordings
//! - Polling index, upload and job status

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::ApiState;

pub struct ApiServer {
    bind_address: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(bind_address: String, state: ApiState) -> Self {
        Self {
            bind_address,
            state,
        }
    }

    /// The full application router, without binding a socket.
    pub fn router(state: ApiState) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(service_info))
            .route("/version", get(version))
            .merge(routes::index::router(state.clone()))
            .merge(routes::upload::router(state.clone()))
            .nest("/status", routes::status::router(state))
            .layer(cors)
    }

    pub async fn start(self) -> Result<()> {
        let app = Self::router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind_address))?;

        info!("API server listening on http://{}", self.bind_address);
        info!("Endpoints:");
        info!("  GET  /                     - Service info");
        info!("  POST /db/index             - Build or update the index");
        info!("  POST /db/query             - Query the index");
        info!("  POST /upload               - Upload a recording (.mp4, .mov)");
        info!("  GET  /status/db            - Index state");
        info!("  GET  /status/uploads       - Pending uploads");
        info!("  GET  /status/recordings    - Last job report");
        info!("  GET  /status/capabilities  - Configured backends");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "recall-index",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "recall-index"
    }))
}
