//! SMTP mail transport

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use secrecy::ExposeSecret;
use tokio::time::timeout;
use tracing::debug;

use crate::app::options::SmtpOptions;
use crate::errors::DeployError;
use crate::report::email::{MailMessage, MailTransport, SEND_TIMEOUT};

/// Sends messages through an SMTP server.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    options: SmtpOptions,
    timeout: Duration,
}

impl SmtpTransport {
    pub fn new(options: SmtpOptions) -> Self {
        Self {
            options,
            timeout: SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeployError> {
        let host = self.options.host.as_str();
        let mut builder = if self.options.ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(transport_error)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        if let Some(port) = self.options.port {
            builder = builder.port(port);
        }
        if let Some(user) = &self.options.user {
            let password = self
                .options
                .password
                .as_ref()
                .map(|password| password.expose_secret().to_string())
                .unwrap_or_default();
            builder = builder.credentials(Credentials::new(user.clone(), password));
        }
        Ok(builder.timeout(Some(self.timeout)).build())
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), DeployError> {
        let envelope = envelope(message)?;
        let mailer = self.mailer()?;
        let mime = message.to_mime();
        debug!("Sending deployment email through {}", self.options.host);

        match timeout(self.timeout, mailer.send_raw(&envelope, mime.as_bytes())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DeployError::TransportError(format!(
                "SMTP server {} did not take the message: {}",
                self.options.host, e
            ))),
            Err(_) => Err(DeployError::TransportError(format!(
                "SMTP server {} did not answer within {} seconds",
                self.options.host,
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

/// Sender and recipients of `message`. `to` may list several addresses
/// separated by commas; an empty `from` gives a null sender.
pub fn envelope(message: &MailMessage) -> Result<Envelope, DeployError> {
    let from = if message.from.is_empty() {
        None
    } else {
        Some(parse_address(&message.from)?)
    };
    let to = message
        .to
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(parse_address)
        .collect::<Result<Vec<_>, _>>()?;
    Envelope::new(from, to).map_err(transport_error)
}

fn parse_address(address: &str) -> Result<Address, DeployError> {
    address
        .parse()
        .map_err(|e| DeployError::TransportError(format!("Invalid address {}: {}", address, e)))
}

fn transport_error(e: impl Display) -> DeployError {
    DeployError::TransportError(e.to_string())
}
