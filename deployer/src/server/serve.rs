//! HTTP server setup

use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DeployError;
use crate::server::handlers::{deploy_handler, forbidden_handler, health_handler, manual_handler};
use crate::server::state::ServerState;

/// Routes of the deployment server
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/{token}/deploy", any(deploy_handler))
        .route("/{token}/manual", any(manual_handler))
        .fallback(forbidden_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DeployError>>, DeployError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        if e.kind() == ErrorKind::AddrInUse {
            DeployError::ServerError(format!(
                "Port {} in use, please free it and retry again",
                options.port
            ))
        } else {
            DeployError::ServerError(format!(
                "Could not start server on port {}: {}",
                options.port, e
            ))
        }
    })?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeployError::ServerError(e.to_string()))
    });

    Ok(handle)
}
