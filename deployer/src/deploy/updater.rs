//! Directory updates from source control

use std::path::Path;

use tracing::debug;

use crate::app::options::DeploymentConfig;
use crate::deploy::runner::{exec_in, CommandRunner};
use crate::errors::DeployError;
use crate::report::ReportSink;

pub const FETCH_COMMAND: &str = "git fetch";
pub const LOG_INCOMING_COMMAND: &str = "git log --oneline HEAD..@{upstream}";
pub const DIFF_INCOMING_COMMAND: &str = "git diff HEAD...@{upstream}";
pub const MERGE_COMMAND: &str = "git merge @{upstream}";

/// Bring `directory` up to date and install its dependencies.
///
/// In detail mode the incoming commits and diff are shown before merging.
/// That preview is best effort: a failing `git log` or `git diff` is
/// reported but does not stop the update.
pub async fn update(
    directory: &Path,
    config: &DeploymentConfig,
    runner: &dyn CommandRunner,
    sink: &dyn ReportSink,
) -> Result<(), DeployError> {
    sink.info(&format!("Updating {}", directory.display()));
    let timeout = config.timeout();

    if config.detail {
        exec_in(runner, sink, FETCH_COMMAND, directory, timeout).await?;
        for preview in [LOG_INCOMING_COMMAND, DIFF_INCOMING_COMMAND] {
            if let Err(e) = exec_in(runner, sink, preview, directory, timeout).await {
                debug!("Ignoring failed preview '{}': {}", preview, e);
                sink.warning(&format!("Could not show incoming changes with {}", preview));
            }
        }
        exec_in(runner, sink, MERGE_COMMAND, directory, timeout).await?;
    } else {
        exec_in(runner, sink, &config.update_command, directory, timeout).await?;
    }

    if !config.no_install {
        exec_in(runner, sink, &config.install_command, directory, timeout).await?;
    }
    Ok(())
}
