//! Sequential deployment executor

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::options::DeploymentConfig;
use crate::deploy::pipeline::{build, Stage};
use crate::deploy::runner::{CommandRunner, ShellRunner};
use crate::report::{with_quiet, ProcessSink, ReportSink};
use crate::utils::round_elapsed;

/// Outcome of one deployment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,

    /// Diagnostic of the failed stage
    pub error_message: Option<String>,

    /// Wall-clock seconds spent in stages, two decimals
    pub elapsed_seconds: f64,
}

impl PipelineResult {
    /// Final status line, as reported when the run ends
    pub fn message(&self) -> String {
        if self.success {
            format!("Deployment success! in {} seconds", self.elapsed_seconds)
        } else {
            format!(
                "Error running deployment after {} seconds; finishing",
                self.elapsed_seconds
            )
        }
    }
}

/// Called once with the result of a run
pub type OnComplete = Box<dyn FnOnce(&PipelineResult) + Send>;

/// A deployment of one package, with its stages assembled up front.
pub struct Deployment {
    config: DeploymentConfig,
    stages: Vec<Stage>,
    runner: Arc<dyn CommandRunner>,
    sink: Arc<dyn ReportSink>,
}

impl Deployment {
    /// Assemble the stages for `config`. A configuration without any
    /// directory or command is reported here, not when running.
    pub fn new(
        config: DeploymentConfig,
        sink: Arc<dyn ReportSink>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let sink = with_quiet(sink, config.quiet);
        let stages = build(&config, sink.as_ref());
        Self {
            config,
            stages,
            runner,
            sink,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub async fn run(&self, on_complete: Option<OnComplete>) -> PipelineResult {
        execute(
            &self.stages,
            &self.config,
            self.runner.as_ref(),
            self.sink.as_ref(),
            on_complete,
        )
        .await
    }
}

/// Run `stages` in order, stopping at the first failure.
///
/// The final status is always reported through `sink` before
/// `on_complete` sees it.
pub async fn execute(
    stages: &[Stage],
    config: &DeploymentConfig,
    runner: &dyn CommandRunner,
    sink: &dyn ReportSink,
    on_complete: Option<OnComplete>,
) -> PipelineResult {
    if let Some(name) = &config.package_name {
        sink.notice(&format!("Starting deployment for {}", name));
    }

    let start = Instant::now();
    let mut failure = None;
    for stage in stages {
        debug!("Running stage: {}", stage);
        if let Err(e) = stage.run(config, runner, sink).await {
            failure = Some(e.to_string());
            break;
        }
    }
    let elapsed_seconds = round_elapsed(start.elapsed());

    let result = PipelineResult {
        success: failure.is_none(),
        error_message: failure,
        elapsed_seconds,
    };
    match &result.error_message {
        None => sink.notice(&result.message()),
        Some(detail) => {
            sink.error(detail);
            sink.error(&result.message());
        }
    }

    if let Some(on_complete) = on_complete {
        on_complete(&result);
    }
    result
}

/// Run a deployment with the system shell.
///
/// Without a sink, reports go to the process log. Without a callback,
/// the final status is only visible through the sink and the returned
/// result.
pub async fn run_deployment(
    config: DeploymentConfig,
    sink: Option<Arc<dyn ReportSink>>,
    on_complete: Option<OnComplete>,
) -> PipelineResult {
    let sink = sink.unwrap_or_else(|| Arc::new(ProcessSink));
    Deployment::new(config, sink, Arc::new(ShellRunner))
        .run(on_complete)
        .await
}
