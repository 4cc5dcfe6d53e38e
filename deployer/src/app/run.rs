//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::deploy::executor::{run_deployment, PipelineResult};
use crate::deploy::runner::ShellRunner;
use crate::errors::DeployError;
use crate::report::{transport_for, EmailSink, ProcessSink, ReportSink};
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::utils::create_token;

/// How long in-flight requests get to finish on shutdown
const MAX_SHUTDOWN_DELAY: Duration = Duration::from_secs(30);

/// Run the deployment server until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeployError> {
    info!("Initializing deployment server...");

    let token = match &options.server.token {
        Some(token) => token.clone(),
        None => {
            let token = create_token();
            warn!("No token given, using generated token {}", token);
            SecretString::from(token)
        }
    };
    let endpoint = format!(
        "http://localhost:{}/{}/deploy",
        options.server.port,
        token.expose_secret()
    );

    let mut state = ServerState::new(token, options.deployment.clone(), Arc::new(ShellRunner));
    if let Some(email) = &options.email {
        state = state.with_email(email.clone(), transport_for(email));
    }

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let server_handle = serve(&options.server, Arc::new(state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;
    info!("Listening on endpoint {}", endpoint);

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(MAX_SHUTDOWN_DELAY, server_handle).await {
        Ok(joined) => joined.map_err(|e| DeployError::ServerError(e.to_string()))??,
        Err(_) => {
            error!("Shutdown timed out after {:?}", MAX_SHUTDOWN_DELAY);
            return Err(DeployError::ServerError("Shutdown timed out".to_string()));
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Run one deployment right away, without a server
pub async fn run_once(options: AppOptions) -> PipelineResult {
    let Some(email) = options.email else {
        return run_deployment(options.deployment, None, None).await;
    };

    let transport = transport_for(&email);
    let sink = Arc::new(
        EmailSink::new(email, options.deployment.package_name.clone(), transport)
            .forwarding_to(Arc::new(ProcessSink)),
    );
    let result = run_deployment(
        options.deployment,
        Some(sink.clone() as Arc<dyn ReportSink>),
        None,
    )
    .await;
    if let Err(e) = sink.send_email(&result).await {
        error!("Deployment report not mailed: {}", e);
    }
    result
}
