//! Error types for the deployer

use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// An external command exited non-zero or could not be spawned.
    /// The detail already carries the captured output.
    #[error("{detail}")]
    CommandFailed { command: String, detail: String },

    /// The command was killed at its deadline. Output produced until
    /// then is kept.
    #[error("{command}: {stdout}\nError: Command timed out after {seconds} seconds, {stderr}")]
    Timeout {
        command: String,
        seconds: f64,
        stdout: String,
        stderr: String,
    },

    #[error("Mail transport error: {0}")]
    TransportError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Command text for command-level failures.
    pub fn command(&self) -> Option<&str> {
        match self {
            DeployError::CommandFailed { command, .. } | DeployError::Timeout { command, .. } => {
                Some(command.as_str())
            }
            _ => None,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
