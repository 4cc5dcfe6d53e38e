//! Deployment stages and how they are assembled

use std::fmt;
use std::path::PathBuf;

use crate::app::options::DeploymentConfig;
use crate::deploy::runner::{exec_in, CommandRunner};
use crate::deploy::updater::update;
use crate::errors::DeployError;
use crate::report::ReportSink;

/// One unit of deployment work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Update a directory from source control and install dependencies
    Update { directory: PathBuf },

    /// Run a shell command in a directory
    Run { command: String, directory: PathBuf },
}

impl Stage {
    pub async fn run(
        &self,
        config: &DeploymentConfig,
        runner: &dyn CommandRunner,
        sink: &dyn ReportSink,
    ) -> Result<(), DeployError> {
        match self {
            Stage::Update { directory } => update(directory, config, runner, sink).await,
            Stage::Run { command, directory } => {
                exec_in(runner, sink, command, directory, config.timeout())
                    .await
                    .map(|_| ())
            }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Update { directory } => write!(f, "update {}", directory.display()),
            Stage::Run { command, directory } => {
                write!(f, "run '{}' in {}", command, directory.display())
            }
        }
    }
}

/// Assemble the stages for `config`, in execution order:
/// test directory update and tests, deployment directory update, then
/// the deployment command.
pub fn build(config: &DeploymentConfig, sink: &dyn ReportSink) -> Vec<Stage> {
    let mut stages = Vec::new();

    if let Some(test_directory) = &config.test_directory {
        stages.push(Stage::Update {
            directory: test_directory.clone(),
        });
        stages.push(Stage::Run {
            command: config.test_command.clone(),
            directory: test_directory.clone(),
        });
    }

    if let Some(directory) = &config.directory {
        stages.push(Stage::Update {
            directory: directory.clone(),
        });
    }

    if let Some(command) = &config.deployment_command {
        stages.push(Stage::Run {
            command: command.clone(),
            directory: config
                .directory
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        });
    }

    if stages.is_empty() {
        sink.warning("No directories given; no deployment done");
    }
    stages
}
