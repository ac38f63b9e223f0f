//! Integration tests for the upload/analysis request lifecycle.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    FIXTURE_TOKEN, Scripted, ScriptedTransport, analysis_json, pdf, signed_in_app,
};
use doclens_analysis_contract::{
    CONNECTION_ERROR_MESSAGE, INVALID_CREDENTIAL_MESSAGE, MISSING_ANALYSIS_MESSAGE,
    MISSING_CREDENTIAL_MESSAGE,
};
use doclens_core::{ApiResponse, RequestBody, UploadFile, endpoints};
use doclens_upload::{AnalysisRequestState, SelectionOutcome};
use serde_json::json;
use tokio::sync::Notify;

#[tokio::test]
async fn analysis_lifecycle_tests_invalid_files_never_reach_backend() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, true).await;

    let oversized = pdf("big.pdf", 10 * 1024 * 1024 + 1);
    let outcome = app.uploads().select_file(oversized).await;
    assert!(matches!(outcome, SelectionOutcome::Rejected(_)));

    let archive = UploadFile::new("bundle.zip", "application/zip", vec![1, 2, 3]);
    let outcome = app.uploads().select_file(archive).await;
    assert!(matches!(outcome, SelectionOutcome::Rejected(_)));

    assert!(transport.requests_to(endpoints::ANALYZE_FILE).is_empty());
    assert_eq!(app.uploads().state(), AnalysisRequestState::Idle);
    assert!(app.uploads().snapshot().last_rejection.is_some());
}

#[tokio::test]
async fn analysis_lifecycle_tests_pdf_succeeds_with_matching_file_name() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, true).await;
    transport.push(Scripted::Respond(ApiResponse::json(
        200,
        &analysis_json("notice.pdf"),
    )));

    let outcome = app
        .uploads()
        .select_file(pdf("notice.pdf", 2 * 1024 * 1024))
        .await;

    let SelectionOutcome::Completed(AnalysisRequestState::Succeeded(result)) = outcome else {
        panic!("expected a successful analysis, got {outcome:?}");
    };
    assert_eq!(result.file_name, "notice.pdf");
    assert!(app.uploads().snapshot().show_result);

    let sent = transport.requests_to(endpoints::ANALYZE_FILE);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bearer.as_deref(), Some(FIXTURE_TOKEN));
    let RequestBody::Multipart(form) = &sent[0].body else {
        panic!("analysis must be sent as multipart");
    };
    assert_eq!(form.file.name, "notice.pdf");
    assert_eq!(
        form.fields,
        vec![("language".to_string(), "en".to_string())]
    );
}

#[tokio::test]
async fn analysis_lifecycle_tests_missing_credential_fails_without_call() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, false).await;

    let outcome = app.uploads().select_file(pdf("notice.pdf", 512)).await;

    assert_eq!(
        outcome,
        SelectionOutcome::Completed(AnalysisRequestState::Failed(
            MISSING_CREDENTIAL_MESSAGE.to_string()
        ))
    );
    assert!(transport.requests_to(endpoints::ANALYZE_FILE).is_empty());
}

#[tokio::test]
async fn analysis_lifecycle_tests_selection_ignored_while_pending() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, true).await;
    let gate = Arc::new(Notify::new());
    transport.push(Scripted::Gated(
        ApiResponse::json(200, &analysis_json("first.pdf")),
        Arc::clone(&gate),
    ));

    let mut updates = app.uploads().subscribe();
    let first = app.uploads().select_file(pdf("first.pdf", 1024));
    let second = async {
        updates
            .wait_for(|snapshot| snapshot.request.is_pending())
            .await
            .expect("controller alive");
        let busy = app.uploads().select_file(pdf("second.pdf", 1024)).await;
        let reset_while_pending = app.uploads().reset();
        gate.notify_one();
        (busy, reset_while_pending)
    };

    let (first, (busy, reset_while_pending)) = tokio::join!(first, second);

    assert_eq!(busy, SelectionOutcome::Busy);
    assert!(!reset_while_pending);
    let SelectionOutcome::Completed(AnalysisRequestState::Succeeded(result)) = first else {
        panic!("first selection should complete, got {first:?}");
    };
    assert_eq!(result.file_name, "first.pdf");
    assert_eq!(transport.requests_to(endpoints::ANALYZE_FILE).len(), 1);

    assert!(app.uploads().reset());
    assert_eq!(app.uploads().state(), AnalysisRequestState::Idle);
}

#[tokio::test]
async fn analysis_lifecycle_tests_unreachable_backend_reports_connection_error() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, true).await;
    transport.push(Scripted::Unreachable);

    let outcome = app.uploads().select_file(pdf("notice.pdf", 1024)).await;

    assert_eq!(
        outcome,
        SelectionOutcome::Completed(AnalysisRequestState::Failed(
            CONNECTION_ERROR_MESSAGE.to_string()
        ))
    );
    assert!(app.session().is_authenticated());
}

#[tokio::test]
async fn analysis_lifecycle_tests_timeout_reports_connection_error() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, true).await;
    transport.push(Scripted::Timeout);

    let outcome = app.uploads().select_file(pdf("notice.pdf", 1024)).await;

    assert_eq!(
        outcome,
        SelectionOutcome::Completed(AnalysisRequestState::Failed(
            CONNECTION_ERROR_MESSAGE.to_string()
        ))
    );
    assert!(app.session().is_authenticated());
    assert!(app.uploads().reset());
}

#[tokio::test]
async fn analysis_lifecycle_tests_abandoned_selection_releases_controller() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, true).await;
    let never_answered = Arc::new(Notify::new());
    transport.push(Scripted::Gated(
        ApiResponse::json(200, &analysis_json("a.pdf")),
        never_answered,
    ));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        app.uploads().select_file(pdf("a.pdf", 1024)),
    )
    .await;

    assert!(abandoned.is_err());
    assert_eq!(
        app.uploads().state(),
        AnalysisRequestState::Failed(CONNECTION_ERROR_MESSAGE.to_string())
    );
    assert!(!app.uploads().snapshot().show_result);
    assert!(app.uploads().reset());

    transport.push(Scripted::Respond(ApiResponse::json(
        200,
        &analysis_json("b.pdf"),
    )));
    let next = app.uploads().select_file(pdf("b.pdf", 1024)).await;
    let SelectionOutcome::Completed(AnalysisRequestState::Succeeded(result)) = next else {
        panic!("controller should accept a new selection, got {next:?}");
    };
    assert_eq!(result.file_name, "b.pdf");
}

#[tokio::test]
async fn analysis_lifecycle_tests_backend_failures_map_to_messages() {
    let transport = ScriptedTransport::new(Vec::new());
    let app = signed_in_app(&transport, true).await;
    transport.push(Scripted::Respond(ApiResponse::json(
        400,
        &json!({ "detail": "API key not valid" }),
    )));
    transport.push(Scripted::Respond(ApiResponse::json(
        200,
        &json!({ "file_name": "notice.pdf" }),
    )));

    let invalid_key = app.uploads().select_file(pdf("notice.pdf", 64)).await;
    let empty = app.uploads().select_file(pdf("notice.pdf", 64)).await;

    assert_eq!(
        invalid_key,
        SelectionOutcome::Completed(AnalysisRequestState::Failed(
            INVALID_CREDENTIAL_MESSAGE.to_string()
        ))
    );
    assert_eq!(
        empty,
        SelectionOutcome::Completed(AnalysisRequestState::Failed(
            MISSING_ANALYSIS_MESSAGE.to_string()
        ))
    );
}
