//! HTTP request handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::deploy::executor::Deployment;
use crate::report::{PageSink, ProcessSink, StreamOutput};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Largest request body read before it is dropped
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployer".to_string(),
        version: version.version,
    })
}

/// Unknown path or wrong token
pub async fn forbidden_handler() -> Response {
    (StatusCode::FORBIDDEN, "Bad request").into_response()
}

/// Webhook: answer at once and deploy in the background
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(token): Path<String>,
    body: Body,
) -> Response {
    if !state.authorized(&token) {
        warn!("Rejected deployment request with an invalid token");
        return forbidden_handler().await;
    }
    drain_body(body).await;

    tokio::spawn(async move {
        state.deploy_in_background().await;
    });
    (StatusCode::OK, "OK").into_response()
}

/// Manual deployment: stream the deployment as a live HTML page
pub async fn manual_handler(
    State(state): State<Arc<ServerState>>,
    Path(token): Path<String>,
    body: Body,
) -> Response {
    if !state.authorized(&token) {
        warn!("Rejected manual deployment with an invalid token");
        return forbidden_handler().await;
    }
    drain_body(body).await;

    let (output, rx) = StreamOutput::channel();
    let page = Arc::new(PageSink::new(output).forwarding_to(Arc::new(ProcessSink)));
    tokio::spawn(async move {
        let deployment = Deployment::new(
            state.deployment.clone(),
            page.clone(),
            state.runner.clone(),
        );
        deployment.run(None).await;
        page.close();
    });

    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from_stream(rx),
    )
        .into_response()
}

async fn drain_body(body: Body) {
    let start = Instant::now();
    if let Err(e) = axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        debug!("Ignoring unreadable request body: {}", e);
    }
    info!("Request finished in {} ms", start.elapsed().as_millis());
}
