//! Server state

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::error;

use crate::app::options::{DeploymentConfig, EmailOptions};
use crate::deploy::executor::Deployment;
use crate::deploy::runner::CommandRunner;
use crate::report::{EmailSink, MailTransport, ProcessSink, ReportSink};

/// Server state shared across handlers
pub struct ServerState {
    pub token: SecretString,
    pub deployment: DeploymentConfig,
    pub email: Option<(EmailOptions, Arc<dyn MailTransport>)>,
    pub runner: Arc<dyn CommandRunner>,
}

impl ServerState {
    pub fn new(
        token: SecretString,
        deployment: DeploymentConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            token,
            deployment,
            email: None,
            runner,
        }
    }

    /// Mail a report of every webhook deployment.
    pub fn with_email(mut self, options: EmailOptions, transport: Arc<dyn MailTransport>) -> Self {
        self.email = Some((options, transport));
        self
    }

    /// Whether `token` matches the configured one
    pub fn authorized(&self, token: &str) -> bool {
        let expected = self.token.expose_secret().as_bytes();
        let given = token.as_bytes();
        // Compare every byte so timing does not reveal the matching prefix
        expected.len() == given.len()
            && expected
                .iter()
                .zip(given)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    /// Run a deployment reporting to the process log, then mail the page
    /// if email is configured.
    pub async fn deploy_in_background(&self) {
        let Some((options, transport)) = &self.email else {
            Deployment::new(
                self.deployment.clone(),
                Arc::new(ProcessSink),
                self.runner.clone(),
            )
            .run(None)
            .await;
            return;
        };

        let sink = Arc::new(
            EmailSink::new(
                options.clone(),
                self.deployment.package_name.clone(),
                transport.clone(),
            )
            .forwarding_to(Arc::new(ProcessSink)),
        );
        let deployment = Deployment::new(
            self.deployment.clone(),
            sink.clone() as Arc<dyn ReportSink>,
            self.runner.clone(),
        );
        let result = deployment.run(None).await;
        if let Err(e) = sink.send_email(&result).await {
            error!("Deployment report not mailed: {}", e);
        }
    }
}
