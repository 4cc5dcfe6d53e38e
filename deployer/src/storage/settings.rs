//! Settings file management

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::app::options::{
    AppOptions, DeploymentConfig, EmailOptions, ServerOptions, SmtpOptions, DEFAULT_PORT,
};
use crate::logs::{LogLevel, LogOptions};

/// Deployer settings, read from a JSON file
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Secret path segment of the endpoints
    #[serde(default)]
    pub token: Option<String>,

    /// What to deploy
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Email reports
    #[serde(default)]
    pub email: Option<EmailSettings>,
}

/// Email section of the settings file
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    #[serde(default)]
    pub from: String,

    pub to: String,

    #[serde(default)]
    pub sendmail_command: Option<String>,

    /// SMTP server; without it mail goes through the sendmail command
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub ssl: bool,
}

impl EmailSettings {
    pub fn email_options(&self) -> EmailOptions {
        let defaults = EmailOptions::default();
        EmailOptions {
            from: self.from.clone(),
            to: self.to.clone(),
            sendmail_command: self
                .sendmail_command
                .clone()
                .unwrap_or(defaults.sendmail_command),
            smtp: self.host.clone().map(|host| SmtpOptions {
                host,
                port: self.port,
                user: self.user.clone(),
                password: self.password.clone().map(SecretString::from),
                ssl: self.ssl,
            }),
        }
    }
}

fn default_host() -> String {
    ServerOptions::default().host
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_logs: false,
            host: default_host(),
            port: default_port(),
            token: None,
            deployment: DeploymentConfig::default(),
            email: None,
        }
    }
}

impl Settings {
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            json_format: self.json_logs,
            ..Default::default()
        }
    }

    pub fn app_options(&self) -> AppOptions {
        AppOptions {
            server: ServerOptions {
                host: self.host.clone(),
                port: self.port,
                token: self.token.clone().map(SecretString::from),
            },
            deployment: self.deployment.clone(),
            email: self.email.as_ref().map(EmailSettings::email_options),
        }
    }
}
