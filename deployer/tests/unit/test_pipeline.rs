//! End-to-end pipeline tests with real processes

use std::path::PathBuf;
use std::sync::Arc;

use deployer::app::options::DeploymentConfig;
use deployer::deploy::executor::{run_deployment, Deployment, PipelineResult};
use deployer::deploy::runner::ShellRunner;
use deployer::report::Level;
use tokio_test::{assert_err, assert_ok};

use crate::support::{RecordingRunner, RecordingSink};

/// A configuration that only uses portable shell commands
fn local_config(directory: PathBuf) -> DeploymentConfig {
    DeploymentConfig {
        directory: Some(directory.clone()),
        test_directory: Some(directory),
        deployment_command: Some("ls .".to_string()),
        update_command: "echo Already up to date.".to_string(),
        install_command: "echo installed".to_string(),
        test_command: "echo 3 passing".to_string(),
        package_name: Some("sample".to_string()),
        timeout_secs: 10,
        ..Default::default()
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_local_deployment_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
    let sink = Arc::new(RecordingSink::default());

    let result = run_deployment(
        local_config(dir.path().to_path_buf()),
        Some(sink.clone()),
        None,
    )
    .await;

    let outcome: Result<(), String> = result.error_message.clone().map_or(Ok(()), Err);
    assert_ok!(outcome);
    assert!(result.success);
    assert!(result.elapsed_seconds >= 0.0);
    let entries = sink.entries();
    assert!(entries
        .iter()
        .any(|(level, m)| *level == Level::Info && m.starts_with("ls .: ") && m.contains("marker.txt")));
    assert_eq!(entries.last().unwrap().0, Level::Notice);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_update_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let config = DeploymentConfig {
        update_command: "echo cannot pull >&2; exit 1".to_string(),
        ..local_config(dir.path().to_path_buf())
    };
    let sink = Arc::new(RecordingSink::default());
    let (tx, rx) = std::sync::mpsc::channel::<PipelineResult>();

    let result = run_deployment(
        config,
        Some(sink.clone()),
        Some(Box::new(move |result: &PipelineResult| {
            let _ = tx.send(result.clone());
        })),
    )
    .await;

    let seen = rx.recv().unwrap();
    assert_eq!(seen, result);
    assert!(!seen.success);
    let message = seen.error_message.unwrap();
    assert!(message.contains("echo cannot pull >&2; exit 1"));
    assert!(message.contains("cannot pull"));
    // Nothing after the failed update of the test directory
    assert!(!sink
        .entries()
        .iter()
        .any(|(_, m)| m.starts_with("echo 3 passing") || m.starts_with("ls .")));
}

#[tokio::test]
async fn test_failed_stage_skips_rest() {
    let runner = Arc::new(RecordingRunner::failing_on(&["npm install"]));
    let sink = Arc::new(RecordingSink::default());
    let config = DeploymentConfig {
        directory: Some(PathBuf::from("/srv/app")),
        deployment_command: Some("sudo restart app".to_string()),
        ..Default::default()
    };

    let result = Deployment::new(config, sink.clone(), runner.clone())
        .run(None)
        .await;

    assert!(!result.success);
    assert_eq!(runner.commands(), vec!["git pull", "npm install"]);
    let errors = sink.messages_at(Level::Error);
    assert_eq!(errors[0], "npm install: npm install failed");
    assert!(errors.last().unwrap().starts_with("Error running deployment after"));
}

#[test]
fn test_nothing_configured() {
    let sink = Arc::new(RecordingSink::default());
    let deployment = Deployment::new(
        DeploymentConfig::default(),
        sink.clone(),
        Arc::new(ShellRunner),
    );
    assert!(deployment.stages().is_empty());

    let result = tokio_test::block_on(deployment.run(None));

    assert!(result.success);
    assert!(result.elapsed_seconds < 0.5);
    let entries = sink.entries();
    assert_eq!(entries[0], (Level::Warning, "No directories given; no deployment done".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_directory_is_an_error() {
    let config = local_config(PathBuf::from("/nonexistent/deployer/app"));
    let result = Deployment::new(config, Arc::new(RecordingSink::default()), Arc::new(ShellRunner))
        .run(None)
        .await;
    assert!(!result.success);

    let outcome: Result<(), String> = result.error_message.map_or(Ok(()), Err);
    let message = assert_err!(outcome);
    assert!(message.starts_with("echo Already up to date.: "));
}
