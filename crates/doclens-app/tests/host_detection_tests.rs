//! Integration tests for embedded-host detection and startup wiring.

mod common;

use std::sync::Arc;

use common::{RecordingChannel, Scripted, ScriptedTransport, analysis_json, profile_json};
use doclens_app::App;
use doclens_auth::MemoryTokenStore;
use doclens_core::{ApiResponse, UploadFile};
use doclens_host::{
    HapticKind, HostCommand, HostEnvironment, ThemeColors, detect_embedded_host, select_host,
};
use serde_json::json;

fn embedded_environment() -> HostEnvironment {
    HostEnvironment {
        init_data: Some(
            "user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ada%22%7D&hash=abc".to_string(),
        ),
        platform: Some("ios".to_string()),
        version: Some("7.10".to_string()),
    }
}

#[test]
fn host_detection_tests_requires_every_marker() {
    assert!(detect_embedded_host(&embedded_environment()));

    let mut no_payload = embedded_environment();
    no_payload.init_data = Some("   ".to_string());
    assert!(!detect_embedded_host(&no_payload));

    let mut unknown_platform = embedded_environment();
    unknown_platform.platform = Some("unknown".to_string());
    assert!(!detect_embedded_host(&unknown_platform));

    let mut automated = embedded_environment();
    automated.init_data = Some("user=%7B%7D&browser_automation=1".to_string());
    assert!(!detect_embedded_host(&automated));

    assert!(!detect_embedded_host(&HostEnvironment::default()));
}

#[test]
fn host_detection_tests_accepts_unlisted_platforms() {
    let mut new_client = embedded_environment();
    new_client.platform = Some("android_tv".to_string());
    assert!(detect_embedded_host(&new_client));

    let mut missing_platform = embedded_environment();
    missing_platform.platform = None;
    assert!(!detect_embedded_host(&missing_platform));
}

#[test]
fn host_detection_tests_exposes_init_user() {
    let channel = Arc::new(RecordingChannel::default());
    let host = select_host(&embedded_environment(), channel);

    let user = host.init_user().expect("init payload carries a user");
    assert_eq!(user.id, 42);
    assert_eq!(user.first_name, "Ada");
}

#[tokio::test]
async fn host_detection_tests_bootstrap_expands_and_themes_host() {
    let channel = Arc::new(RecordingChannel::default());
    let host = select_host(&embedded_environment(), channel.clone());
    let transport = ScriptedTransport::new(Vec::new());

    let app = App::bootstrap(transport, host, Arc::new(MemoryTokenStore::new()), None).await;

    assert!(app.ui_state().embedded);
    assert_eq!(
        channel.commands(),
        vec![
            HostCommand::Ready,
            HostCommand::Expand,
            HostCommand::SetTheme(ThemeColors::default()),
        ]
    );
}

#[tokio::test]
async fn host_detection_tests_analysis_feedback_reaches_host() {
    let channel = Arc::new(RecordingChannel::default());
    let host = select_host(&embedded_environment(), channel.clone());
    let transport = ScriptedTransport::new(vec![
        Scripted::Respond(ApiResponse::json(200, &profile_json(true))),
        Scripted::Respond(ApiResponse::json(200, &analysis_json("scan.png"))),
    ]);
    let app = App::bootstrap(
        transport,
        host,
        Arc::new(MemoryTokenStore::with_token("tok")),
        None,
    )
    .await;

    let image = UploadFile::new("scan.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
    app.uploads().select_file(image).await;

    let commands = channel.commands();
    assert!(commands.contains(&HostCommand::ImpactOccurred {
        style: HapticKind::Light
    }));
    assert!(commands.contains(&HostCommand::NotificationOccurred {
        kind: HapticKind::Success
    }));
    assert!(
        commands
            .iter()
            .any(|command| matches!(command, HostCommand::ShowAlert { .. }))
    );
}

#[tokio::test]
async fn host_detection_tests_rejected_credential_sends_error_haptic() {
    let channel = Arc::new(RecordingChannel::default());
    let host = select_host(&embedded_environment(), channel.clone());
    let transport = ScriptedTransport::new(vec![
        Scripted::Respond(ApiResponse::json(200, &profile_json(true))),
        Scripted::Respond(ApiResponse::json(
            400,
            &json!({ "detail": "API key not valid" }),
        )),
    ]);
    let app = App::bootstrap(
        transport,
        host,
        Arc::new(MemoryTokenStore::with_token("tok")),
        None,
    )
    .await;

    app.uploads()
        .select_file(UploadFile::new("notice.pdf", "application/pdf", vec![0x25; 64]))
        .await;

    let commands = channel.commands();
    assert!(commands.contains(&HostCommand::NotificationOccurred {
        kind: HapticKind::Error
    }));
    assert!(!commands.contains(&HostCommand::NotificationOccurred {
        kind: HapticKind::Warning
    }));
}

#[tokio::test]
async fn host_detection_tests_missing_credential_sends_warning_haptic() {
    let channel = Arc::new(RecordingChannel::default());
    let host = select_host(&embedded_environment(), channel.clone());
    let transport = ScriptedTransport::new(vec![Scripted::Respond(ApiResponse::json(
        200,
        &profile_json(false),
    ))]);
    let app = App::bootstrap(
        transport,
        host,
        Arc::new(MemoryTokenStore::with_token("tok")),
        None,
    )
    .await;

    app.uploads()
        .select_file(UploadFile::new("notice.pdf", "application/pdf", vec![0x25; 64]))
        .await;

    assert!(channel.commands().contains(&HostCommand::NotificationOccurred {
        kind: HapticKind::Warning
    }));
}

#[tokio::test]
async fn host_detection_tests_standalone_host_posts_nothing() {
    let channel = Arc::new(RecordingChannel::default());
    let host = select_host(&HostEnvironment::default(), channel.clone());
    let transport = ScriptedTransport::new(Vec::new());

    let app = App::bootstrap(transport, host, Arc::new(MemoryTokenStore::new()), None).await;

    assert!(!app.ui_state().embedded);
    assert!(channel.commands().is_empty());
}
