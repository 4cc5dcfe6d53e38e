//! Email sink over a whole deployment

use std::path::PathBuf;
use std::sync::Arc;

use deployer::app::options::{DeploymentConfig, EmailOptions};
use deployer::deploy::executor::Deployment;
use deployer::deploy::fsm::DeliveryState;
use deployer::report::{EmailSink, ReportSink};

use crate::support::{CapturingTransport, RecordingRunner};

fn email_options() -> EmailOptions {
    EmailOptions {
        from: "deploy@example.com".to_string(),
        to: "ops@example.com".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_successful_deployment_is_mailed() {
    let transport = Arc::new(CapturingTransport::default());
    let sink = Arc::new(EmailSink::new(
        email_options(),
        Some("app".to_string()),
        transport.clone(),
    ));
    let config = DeploymentConfig {
        directory: Some(PathBuf::from("/srv/app")),
        package_name: Some("app".to_string()),
        ..Default::default()
    };

    let result = Deployment::new(
        config,
        sink.clone() as Arc<dyn ReportSink>,
        Arc::new(RecordingRunner::default()),
    )
    .run(None)
    .await;
    assert!(result.success);
    assert!(!result.message().is_empty());

    sink.send_email(&result).await.unwrap();

    assert_eq!(sink.delivery_state(), DeliveryState::Sent);
    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("successful"));
    assert!(sent[0].subject.contains("app"));
    assert_eq!(sent[0].to, "ops@example.com");
    let page = &sent[0].attachments[0].data;
    assert!(page.contains("git pull: ok"));
    assert!(page.contains("Deployment success! in"));
}

#[tokio::test]
async fn test_reports_after_send_are_dropped() {
    let transport = Arc::new(CapturingTransport::default());
    let sink = EmailSink::new(email_options(), None, transport.clone());
    sink.notice("before");

    let result = deployer::deploy::executor::PipelineResult {
        success: false,
        error_message: Some("git pull: failed".to_string()),
        elapsed_seconds: 0.1,
    };
    sink.send_email(&result).await.unwrap();
    sink.notice("after");

    let sent = transport.sent.lock().unwrap();
    assert!(sent[0].subject.contains("failed"));
    let page = &sent[0].attachments[0].data;
    assert!(page.contains("before"));
    assert!(!page.contains("after"));
}
