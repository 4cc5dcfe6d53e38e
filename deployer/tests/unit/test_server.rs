//! Router tests, driven in-process

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use deployer::app::options::{DeploymentConfig, EmailOptions};
use deployer::server::serve::router;
use deployer::server::state::ServerState;
use secrecy::SecretString;
use tower::ServiceExt;

use crate::support::{CapturingTransport, RecordingRunner};

const TOKEN: &str = "sm6xrhnmij88qhg1";

fn config() -> DeploymentConfig {
    DeploymentConfig {
        directory: Some(PathBuf::from("/srv/app")),
        deployment_command: Some("sudo restart app".to_string()),
        package_name: Some("app".to_string()),
        ..Default::default()
    }
}

fn state(runner: Arc<RecordingRunner>) -> Arc<ServerState> {
    Arc::new(ServerState::new(SecretString::from(TOKEN.to_string()), config(), runner))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_unknown_path_is_forbidden() {
    let runner = Arc::new(RecordingRunner::default());
    let app = router(state(runner.clone()));

    let response = app
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Bad request");
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_wrong_token_is_forbidden() {
    let runner = Arc::new(RecordingRunner::default());
    let app = router(state(runner.clone()));

    let response = app
        .oneshot(Request::post("/wrongtoken/deploy").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_deploy_answers_then_runs() {
    let runner = Arc::new(RecordingRunner::default());
    let app = router(state(runner.clone()));

    let response = app
        .oneshot(
            Request::post(format!("/{TOKEN}/deploy"))
                .body(Body::from(r#"{"ref": "refs/heads/main"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let expected = vec!["git pull", "npm install", "sudo restart app"];
    for _ in 0..100 {
        if runner.commands().len() == expected.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(runner.commands(), expected);
    assert!(runner
        .calls()
        .iter()
        .all(|(_, cwd)| cwd == &PathBuf::from("/srv/app")));
}

#[tokio::test]
async fn test_deploy_mails_report() {
    let runner = Arc::new(RecordingRunner::default());
    let transport = Arc::new(CapturingTransport::default());
    let email = EmailOptions {
        from: "deploy@example.com".to_string(),
        to: "ops@example.com".to_string(),
        ..Default::default()
    };
    let state = ServerState::new(SecretString::from(TOKEN.to_string()), config(), runner.clone())
        .with_email(email, transport.clone());
    let app = router(Arc::new(state));

    let response = app
        .oneshot(Request::post(format!("/{TOKEN}/deploy")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    for _ in 0..200 {
        if !transport.sent().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Deployment of app successful");
    assert_eq!(sent[0].to, "ops@example.com");
    assert!(sent[0].text.starts_with("Deployment success! in"));
    assert_eq!(sent[0].attachments.len(), 1);
    assert_eq!(sent[0].attachments[0].filename, "deployment.html");
    let page = &sent[0].attachments[0].data;
    assert!(page.contains("Starting deployment for app"));
    assert!(page.contains("sudo restart app: ok"));
    assert!(page.ends_with("</html>"));
    assert_eq!(runner.commands(), vec!["git pull", "npm install", "sudo restart app"]);
}

#[tokio::test]
async fn test_manual_streams_page() {
    let runner = Arc::new(RecordingRunner::failing_on(&["sudo restart app"]));
    let app = router(state(runner.clone()));

    let response = app
        .oneshot(Request::get(format!("/{TOKEN}/manual")).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    let page = body_text(response).await;
    assert!(page.starts_with("<html>"));
    assert!(page.contains("Starting deployment for app"));
    assert!(page.contains("Updating /srv/app"));
    assert!(page.contains("Error running deployment after"));
    assert!(page.ends_with("</body>\n</html>"));
    let updating = page.find("Updating /srv/app").unwrap();
    let failed = page.find("Error running deployment").unwrap();
    assert!(updating < failed);
}

#[tokio::test]
async fn test_health() {
    let app = router(state(Arc::new(RecordingRunner::default())));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
}
