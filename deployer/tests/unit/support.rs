//! Shared fakes, behaving like the ones in the crate's unit tests

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use deployer::deploy::runner::{CommandOutput, CommandRunner, CommandSpec};
use deployer::errors::DeployError;
use deployer::report::{Level, MailMessage, MailTransport, ReportSink};

/// Runner that records invocations instead of spawning processes.
///
/// Successful commands print `ok`; failing ones exit with status 1 and
/// print `<command> failed` on stderr.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<(String, PathBuf)>>,
    failing: Vec<String>,
}

impl RecordingRunner {
    /// Commands equal to any of `failing` exit with status 1.
    pub fn failing_on(failing: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: failing.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _)| c.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        self.calls
            .lock()
            .unwrap()
            .push((spec.command.clone(), spec.cwd.clone()));
        if self.failing.contains(&spec.command) {
            return Ok(CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("{} failed", spec.command),
            });
        }
        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: "ok".to_string(),
            stderr: String::new(),
        })
    }
}

/// Sink that keeps every report in order.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, level: Level, message: &str) {
        self.entries.lock().unwrap().push((level, message.to_string()));
    }
}

/// Transport that keeps sent messages instead of delivering them.
#[derive(Debug, Default)]
pub struct CapturingTransport {
    pub sent: Mutex<Vec<MailMessage>>,
}

impl CapturingTransport {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for CapturingTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), DeployError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
