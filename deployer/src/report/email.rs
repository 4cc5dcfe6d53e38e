//! Email sink
//!
//! Buffers the deployment page in memory and mails it once the
//! deployment has finished.

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info};

use crate::app::options::EmailOptions;
use crate::deploy::executor::PipelineResult;
use crate::deploy::fsm::{DeliveryEvent, DeliveryFsm, DeliveryState};
use crate::errors::DeployError;
use crate::report::page::{BufferOutput, PageSink};
use crate::report::smtp::SmtpTransport;
use crate::report::{Level, ReportSink};

const ATTACHMENT_NAME: &str = "deployment.html";

/// Longest a transport may take to hand over one message
pub const SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: String,
}

/// A composed mail message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl MailMessage {
    /// Render as a MIME `multipart/mixed` message.
    pub fn to_mime(&self) -> String {
        let boundary = format!("deployer-{}", uuid::Uuid::new_v4().simple());
        let mut mime = String::new();
        if !self.from.is_empty() {
            mime.push_str(&format!("From: {}\r\n", self.from));
        }
        mime.push_str(&format!("To: {}\r\n", self.to));
        mime.push_str(&format!("Subject: {}\r\n", self.subject));
        mime.push_str(&format!("Date: {}\r\n", chrono::Utc::now().to_rfc2822()));
        mime.push_str("MIME-Version: 1.0\r\n");
        mime.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
            boundary
        ));

        mime.push_str(&format!("--{}\r\n", boundary));
        mime.push_str("Content-Type: text/plain; charset=UTF-8\r\n\r\n");
        mime.push_str(&self.text);
        mime.push_str("\r\n");

        for attachment in &self.attachments {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&attachment.data);
            mime.push_str(&format!("--{}\r\n", boundary));
            mime.push_str(&format!(
                "Content-Type: {}; charset=UTF-8; name=\"{}\"\r\n",
                attachment.content_type, attachment.filename
            ));
            mime.push_str("Content-Transfer-Encoding: base64\r\n");
            mime.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
                attachment.filename
            ));
            for line in encoded.as_bytes().chunks(76) {
                mime.push_str(&String::from_utf8_lossy(line));
                mime.push_str("\r\n");
            }
        }
        mime.push_str(&format!("--{}--\r\n", boundary));
        mime
    }
}

/// Delivers composed messages
#[async_trait]
pub trait MailTransport: Send + Sync + std::fmt::Debug {
    async fn send(&self, message: &MailMessage) -> Result<(), DeployError>;
}

/// Transport for `options`: the SMTP server when one is configured,
/// otherwise the local sendmail command.
pub fn transport_for(options: &EmailOptions) -> Arc<dyn MailTransport> {
    match &options.smtp {
        Some(smtp) => Arc::new(SmtpTransport::new(smtp.clone())),
        None => Arc::new(SendmailTransport::new(options.sendmail_command.clone())),
    }
}

/// Pipes messages to a local `sendmail`-compatible command.
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    command: String,
    timeout: Duration,
}

impl SendmailTransport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl MailTransport for SendmailTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), DeployError> {
        let mime = message.to_mime();
        let mut child = Command::new("sh")
            .args(["-c", self.command.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DeployError::TransportError(format!("Could not run {}: {}", self.command, e))
            })?;

        // Feed stdin while output is collected, so a chatty command cannot stall
        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(mime.as_bytes()).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let finished = timeout(self.timeout, async {
            tokio::join!(write, child.wait_with_output())
        })
        .await;

        match finished {
            Err(_) => Err(DeployError::TransportError(format!(
                "{} did not finish within {} seconds",
                self.command,
                self.timeout.as_secs_f64()
            ))),
            Ok((_, Err(e))) => Err(DeployError::TransportError(format!(
                "Could not run {}: {}",
                self.command, e
            ))),
            Ok((_, Ok(output))) if !output.status.success() => {
                Err(DeployError::TransportError(format!(
                    "{} exited with {}: {}",
                    self.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
            Ok((Err(e), Ok(_))) => Err(DeployError::TransportError(format!(
                "Could not pass the message to {}: {}",
                self.command, e
            ))),
            Ok((Ok(()), Ok(_))) => Ok(()),
        }
    }
}

/// Sink that renders a page into memory and mails it afterwards.
pub struct EmailSink {
    page: PageSink,
    buffer: BufferOutput,
    options: EmailOptions,
    package_name: String,
    transport: Arc<dyn MailTransport>,
    delivery: Mutex<DeliveryFsm>,
}

impl EmailSink {
    pub fn new(
        options: EmailOptions,
        package_name: Option<String>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let buffer = BufferOutput::new();
        Self {
            page: PageSink::new(buffer.clone()),
            buffer,
            options,
            package_name: package_name.unwrap_or_else(|| "package".to_string()),
            transport,
            delivery: Mutex::new(DeliveryFsm::new()),
        }
    }

    /// Page forwards every report to `sink` as well.
    pub fn forwarding_to(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.page = self.page.forwarding_to(sink);
        self
    }

    pub fn delivery_state(&self) -> DeliveryState {
        self.lock().state()
    }

    /// Close the page. Further reports are dropped.
    pub fn finish(&self) {
        self.page.close();
        let mut delivery = self.lock();
        if delivery.state() == DeliveryState::Pending {
            // Pending -> ReadyToSend is always valid
            let _ = delivery.process(DeliveryEvent::Finish);
        }
    }

    /// Compose the message for `result` without sending it.
    pub fn compose(&self, result: &PipelineResult) -> MailMessage {
        let outcome = if result.success { "successful" } else { "failed" };
        let mut text = result.message();
        if let Some(detail) = &result.error_message {
            text.push_str("\n\n");
            text.push_str(detail);
        }
        MailMessage {
            from: self.options.from.clone(),
            to: self.options.to.clone(),
            subject: format!("Deployment of {} {}", self.package_name, outcome),
            text,
            attachments: vec![Attachment {
                filename: ATTACHMENT_NAME.to_string(),
                content_type: "text/html".to_string(),
                data: self.buffer.contents(),
            }],
        }
    }

    /// Mail the finished page. A send failure is returned and logged but
    /// does not alter `result`. Each sink sends at most once.
    pub async fn send_email(&self, result: &PipelineResult) -> Result<(), DeployError> {
        self.finish();
        let already_sent = self.lock().is_terminal();
        if already_sent {
            return Err(DeployError::TransportError(
                "Deployment email already sent".to_string(),
            ));
        }

        let message = self.compose(result);
        let sent = self.transport.send(&message).await;

        let mut delivery = self.lock();
        match &sent {
            Ok(()) => {
                info!("Sent deployment email to {}", message.to);
                let _ = delivery.process(DeliveryEvent::SendSuccess);
            }
            Err(e) => {
                error!("Could not send deployment email: {}", e);
                let _ = delivery.process(DeliveryEvent::SendFailed(e.to_string()));
            }
        }
        sent
    }

    fn lock(&self) -> MutexGuard<'_, DeliveryFsm> {
        self.delivery.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReportSink for EmailSink {
    fn report(&self, level: Level, message: &str) {
        self.page.report(level, message);
    }
}
