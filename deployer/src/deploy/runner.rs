//! Shell command execution
//!
//! [`CommandRunner`] is the seam between the deployment pipeline and the
//! operating system. [`ShellRunner`] runs commands through the system
//! shell; tests substitute a recording fake.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::DeployError;
use crate::report::ReportSink;
use crate::utils::round_elapsed;

/// Maximum captured bytes per stream for deployment commands (1 MiB).
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// One command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Shell command line
    pub command: String,

    /// Working directory
    pub cwd: PathBuf,

    /// Kill the command after this long
    pub timeout: Duration,

    /// Captured output per stream is truncated beyond this
    pub max_output_bytes: usize,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            timeout,
            max_output_bytes: MAX_OUTPUT_BYTES,
        }
    }
}

/// Captured output of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands.
///
/// `Err` is reserved for commands that could not run to completion
/// (spawn failure, timeout). A non-zero exit is an `Ok` output; callers
/// check [`CommandOutput::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError>;
}

/// Runs commands through `sh -c` (`cmd /C` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        debug!("Running '{}' in {}", spec.command, spec.cwd.display());

        #[cfg(target_os = "windows")]
        let mut cmd = Command::new("cmd");
        #[cfg(target_os = "windows")]
        cmd.arg("/C").arg(&spec.command);

        #[cfg(not(target_os = "windows"))]
        let mut cmd = Command::new("sh");
        #[cfg(not(target_os = "windows"))]
        cmd.arg("-c").arg(&spec.command);

        // Own process group, so a timeout reaches every process the shell started
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| DeployError::CommandFailed {
            command: spec.command.clone(),
            detail: format!("{}: \nFailed to spawn command: {}, ", spec.command, e),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let max = spec.max_output_bytes;
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let finished = timeout(spec.timeout, async {
            let (stdout, stderr, status) = tokio::join!(
                read_capped(stdout, &mut stdout_buf, max),
                read_capped(stderr, &mut stderr_buf, max),
                child.wait()
            );
            stdout?;
            stderr?;
            status
        })
        .await;

        let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();
        match finished {
            Ok(Ok(status)) => Ok(CommandOutput {
                exit_code: status.code(),
                stdout,
                stderr,
            }),
            Ok(Err(e)) => Err(DeployError::CommandFailed {
                command: spec.command.clone(),
                detail: format!(
                    "{}: {}\nFailed to wait for command: {}, {}",
                    spec.command, stdout, e, stderr
                ),
            }),
            Err(_) => {
                warn!("Command timed out, killing: '{}'", spec.command);
                kill_tree(&mut child, &spec.command).await;
                Err(DeployError::Timeout {
                    command: spec.command.clone(),
                    seconds: round_elapsed(spec.timeout),
                    stdout,
                    stderr,
                })
            }
        }
    }
}

/// Kill the shell and everything in its process group, then reap it.
async fn kill_tree(child: &mut Child, command: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            #[allow(clippy::cast_possible_wrap)]
            let group = Pid::from_raw(pid as i32);
            if let Err(e) = killpg(group, Signal::SIGKILL) {
                warn!("Failed to kill process group of '{}': {}", command, e);
            }
        }
    }
    if let Err(e) = child.kill().await {
        warn!("Failed to kill '{}': {}", command, e);
    }
}

/// Read a stream to the end into `kept`, keeping at most `max` bytes.
///
/// The rest is still drained so the child never blocks on a full pipe.
/// Whatever was read stays in `kept` if the read is abandoned.
async fn read_capped<R>(reader: Option<R>, kept: &mut Vec<u8>, max: usize) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        let room = max.saturating_sub(kept.len());
        if read > room {
            truncated = true;
        }
        kept.extend_from_slice(&chunk[..read.min(room)]);
    }
    if truncated {
        warn!(max_bytes = max, "Command output exceeded limit, truncating");
    }
    Ok(())
}

/// Run `command` in `directory` and report what happened.
///
/// Every invocation reports `"<command>: <stdout>"` at info. Stderr of a
/// successful command is reported as a warning, since many tools print
/// progress there. A failure carries the command, stdout, the error and
/// stderr in one diagnostic string.
pub async fn exec_in(
    runner: &dyn CommandRunner,
    sink: &dyn ReportSink,
    command: &str,
    directory: &Path,
    timeout: Duration,
) -> Result<String, DeployError> {
    let spec = CommandSpec::new(command, directory, timeout);
    let output = match runner.run(&spec).await {
        Ok(output) => output,
        Err(e) => {
            match &e {
                DeployError::Timeout { stdout, stderr, .. } => {
                    sink.info(&format!("{}: {}", command, stdout));
                    sink.error(&format!("{}: {}", command, stderr));
                }
                _ => {
                    sink.info(&format!("{}: ", command));
                    sink.error(&e.to_string());
                }
            }
            return Err(e);
        }
    };

    sink.info(&format!("{}: {}", command, output.stdout));
    if output.success() {
        if !output.stderr.is_empty() {
            sink.warning(&format!("{}: {}", command, output.stderr));
        }
        return Ok(output.stdout);
    }

    let status = match output.exit_code {
        Some(code) => format!("Error: Command failed with exit code {}", code),
        None => "Error: Command terminated by signal".to_string(),
    };
    let detail = format!("{}: {}\n{}, {}", command, output.stdout, status, output.stderr);
    sink.error(&format!("{}: {}", command, output.stderr));
    Err(DeployError::CommandFailed {
        command: command.to_string(),
        detail,
    })
}
