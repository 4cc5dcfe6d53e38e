//! Application configuration options

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Default port for the deployment server
pub const DEFAULT_PORT: u16 = 3470;

/// Everything one deployment run needs. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// Production directory to update
    pub directory: Option<PathBuf>,

    /// Directory where tests run before touching production
    pub test_directory: Option<PathBuf>,

    /// How a directory is brought up to date
    pub update_command: String,

    /// Dependency install, skipped with `no_install`
    pub install_command: String,

    /// Test suite run in the test directory
    pub test_command: String,

    /// Run after a successful update, e.g. `sudo restart myService`
    pub deployment_command: Option<String>,

    /// Label used in notices and email subjects
    pub package_name: Option<String>,

    /// Per-command timeout in seconds
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,

    /// Fetch, show incoming log and diff, then merge
    pub detail: bool,

    pub no_install: bool,

    /// Only report notices and above
    pub quiet: bool,
}

impl DeploymentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            directory: None,
            test_directory: None,
            update_command: "git pull".to_string(),
            install_command: "npm install".to_string(),
            test_command: "npm test".to_string(),
            deployment_command: None,
            package_name: None,
            timeout_secs: 60,
            detail: false,
            no_install: false,
            quiet: false,
        }
    }
}

/// Email report options
#[derive(Debug, Clone)]
pub struct EmailOptions {
    pub from: String,
    pub to: String,

    /// Command that reads a full message on stdin
    pub sendmail_command: String,

    /// Send through this SMTP server instead of `sendmail_command`
    pub smtp: Option<SmtpOptions>,
}

impl Default for EmailOptions {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            sendmail_command: "sendmail -t -i".to_string(),
            smtp: None,
        }
    }
}

/// SMTP server for email reports
#[derive(Debug, Clone, Default)]
pub struct SmtpOptions {
    pub host: String,

    /// Defaults to 465 with `ssl`, 25 without
    pub port: Option<u16>,

    pub user: Option<String>,
    pub password: Option<SecretString>,

    /// Implicit TLS; plain SMTP otherwise
    pub ssl: bool,
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Secret path segment; `None` means generate one at startup
    pub token: Option<SecretString>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            token: None,
        }
    }
}

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Server configuration
    pub server: ServerOptions,

    /// What to deploy and how
    pub deployment: DeploymentConfig,

    /// Mail the deployment page when set
    pub email: Option<EmailOptions>,
}

impl AppOptions {
    /// Apply command line flags on top of the current values.
    ///
    /// Deployment flags are `dir`, `testdir`, `exec`, `update`, `install`,
    /// `test`, `name`, `noinst`, `detail`, `quiet` and `timeout`; the server
    /// takes `token`, `port` and `bind`. Email reports are configured with
    /// `from`, `to` and `sendmail`, or `host`, `user`, `password` and `ssl`
    /// for an SMTP server.
    pub fn apply_args(&mut self, args: &HashMap<String, String>) -> Result<(), DeployError> {
        let deployment = &mut self.deployment;
        if let Some(dir) = args.get("dir") {
            deployment.directory = Some(PathBuf::from(dir));
        }
        if let Some(dir) = args.get("testdir") {
            deployment.test_directory = Some(PathBuf::from(dir));
        }
        if let Some(command) = args.get("exec") {
            deployment.deployment_command = Some(command.clone());
        }
        if let Some(command) = args.get("update") {
            deployment.update_command = command.clone();
        }
        if let Some(command) = args.get("install") {
            deployment.install_command = command.clone();
        }
        if let Some(command) = args.get("test") {
            deployment.test_command = command.clone();
        }
        if let Some(name) = args.get("name") {
            deployment.package_name = Some(name.clone());
        }
        if let Some(timeout) = args.get("timeout") {
            deployment.timeout_secs = timeout
                .parse()
                .map_err(|_| DeployError::ConfigError(format!("Invalid timeout {}", timeout)))?;
        }
        deployment.no_install |= flag(args, "noinst")?;
        deployment.detail |= flag(args, "detail")?;
        deployment.quiet |= flag(args, "quiet")?;

        if let Some(port) = args.get("port") {
            self.server.port = port
                .parse()
                .map_err(|_| DeployError::ConfigError(format!("Invalid port {}", port)))?;
        }
        if let Some(bind) = args.get("bind") {
            self.server.host = bind.clone();
        }
        if let Some(token) = args.get("token") {
            self.server.token = Some(SecretString::from(token.clone()));
        }

        if EMAIL_FLAGS.iter().any(|name| args.contains_key(*name)) {
            let email = self.email.get_or_insert_with(EmailOptions::default);
            if let Some(from) = args.get("from") {
                email.from = from.clone();
            }
            if let Some(to) = args.get("to") {
                email.to = to.clone();
            }
            if let Some(command) = args.get("sendmail") {
                email.sendmail_command = command.clone();
            }
            if let Some(host) = args.get("host") {
                email.smtp.get_or_insert_with(SmtpOptions::default).host = host.clone();
            }
            if SMTP_FLAGS.iter().any(|name| args.contains_key(*name)) {
                let Some(smtp) = email.smtp.as_mut() else {
                    return Err(DeployError::ConfigError(
                        "SMTP options need the server host (--host)".to_string(),
                    ));
                };
                if let Some(user) = args.get("user") {
                    smtp.user = Some(user.clone());
                }
                if let Some(password) = args.get("password") {
                    smtp.password = Some(SecretString::from(password.clone()));
                }
                smtp.ssl |= flag(args, "ssl")?;
            }
        }
        if let Some(email) = &self.email {
            if email.to.is_empty() {
                return Err(DeployError::ConfigError(
                    "Email reports need a destination address (--to)".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Flags that take a value, given as `--flag=value` or `--flag value`
const VALUE_FLAGS: [&str; 18] = [
    "dir", "testdir", "exec", "update", "install", "test", "name", "timeout", "port", "bind",
    "token", "from", "to", "sendmail", "host", "user", "password", "config",
];

/// Parse command line arguments into flag names and values.
///
/// Flags without a value are switches, set to `true` or to a following
/// `true`/`false`. A bare number is the port.
pub fn parse_args<I>(args: I) -> Result<HashMap<String, String>, DeployError>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = HashMap::new();
    let mut args = args.into_iter().peekable();
    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix('-') else {
            if arg.parse::<u16>().is_err() {
                return Err(DeployError::ConfigError(format!("Invalid port {}", arg)));
            }
            parsed.insert("port".to_string(), arg);
            continue;
        };
        let flag = flag.trim_start_matches('-');
        if let Some((key, value)) = flag.split_once('=') {
            parsed.insert(key.to_string(), value.to_string());
        } else if VALUE_FLAGS.contains(&flag) {
            let Some(value) = args.next_if(|next| !next.starts_with("--")) else {
                return Err(DeployError::ConfigError(format!("Missing value for --{}", flag)));
            };
            parsed.insert(flag.to_string(), value);
        } else {
            let value = args
                .next_if(|next| next == "true" || next == "false")
                .unwrap_or_else(|| "true".to_string());
            parsed.insert(flag.to_string(), value);
        }
    }
    Ok(parsed)
}

const EMAIL_FLAGS: [&str; 7] = ["from", "to", "sendmail", "host", "user", "password", "ssl"];

const SMTP_FLAGS: [&str; 3] = ["user", "password", "ssl"];

fn flag(args: &HashMap<String, String>, name: &str) -> Result<bool, DeployError> {
    match args.get(name).map(String::as_str) {
        None | Some("false") => Ok(false),
        Some("true") | Some("") => Ok(true),
        Some(other) => Err(DeployError::ConfigError(format!(
            "Invalid value {} for --{}",
            other, name
        ))),
    }
}
