//! Shared fixtures for app integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use doclens_app::App;
use doclens_auth::MemoryTokenStore;
use doclens_core::{ApiRequest, ApiResponse, BackendTransport, TransportError, UploadFile};
use doclens_host::{HostBridge, HostChannel, HostCommand, HostError, StandaloneHost};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// Token held by the signed-in fixture.
#[allow(dead_code)]
pub const FIXTURE_TOKEN: &str = "tok-fixture-123";

/// One scripted transport reaction.
#[allow(dead_code)]
pub enum Scripted {
    /// Respond immediately.
    Respond(ApiResponse),
    /// Respond once the gate is notified.
    Gated(ApiResponse, Arc<Notify>),
    /// Fail as if the backend were down.
    Unreachable,
    /// Fail as if the request timed out.
    Timeout,
}

/// In-memory transport replaying scripted reactions in order and recording
/// every request it receives.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ApiRequest>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    /// Creates a transport with `script`.
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Appends one reaction.
    pub fn push(&self, reaction: Scripted) {
        self.script.lock().expect("script lock").push_back(reaction);
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Requests sent to `path`.
    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

#[async_trait]
impl BackendTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().expect("requests lock").push(request);
        let reaction = self.script.lock().expect("script lock").pop_front();
        match reaction {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Gated(response, gate)) => {
                gate.notified().await;
                Ok(response)
            }
            Some(Scripted::Timeout) => Err(TransportError::Timeout),
            Some(Scripted::Unreachable) | None => {
                Err(TransportError::Unreachable("connection refused".to_string()))
            }
        }
    }
}

/// Host channel recording every command.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingChannel {
    commands: Mutex<Vec<HostCommand>>,
}

#[allow(dead_code)]
impl RecordingChannel {
    /// Commands posted so far.
    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().expect("commands lock").clone()
    }
}

impl HostChannel for RecordingChannel {
    fn post(&self, command: &HostCommand) -> Result<(), HostError> {
        self.commands
            .lock()
            .expect("commands lock")
            .push(command.clone());
        Ok(())
    }
}

/// Standalone host discarding alerts.
#[allow(dead_code)]
pub fn quiet_host() -> Arc<dyn HostBridge> {
    Arc::new(StandaloneHost::new(Box::new(std::io::sink()), false))
}

/// Profile body for the signed-in fixture user.
#[allow(dead_code)]
pub fn profile_json(with_credential: bool) -> Value {
    json!({
        "id": "user-1",
        "name": "Ada",
        "email": "ada@example.test",
        "has_gemini_api_key": with_credential,
        "preferred_language": "en"
    })
}

/// Successful analysis body for `file_name`.
#[allow(dead_code)]
pub fn analysis_json(file_name: &str) -> Value {
    json!({
        "file_name": file_name,
        "analysis": {
            "sender": "Tax office",
            "main_content": "Annual assessment",
            "deadlines": "Within 30 days"
        },
        "summary": "Tax assessment notice",
        "actions_needed": ["Check the figures"],
        "urgency_level": "HIGH",
        "llm_provider": "gemini"
    })
}

/// Builds an app whose restored session resolves to the fixture user.
#[allow(dead_code)]
pub async fn signed_in_app(transport: &Arc<ScriptedTransport>, with_credential: bool) -> App {
    transport.push(Scripted::Respond(ApiResponse::json(
        200,
        &profile_json(with_credential),
    )));
    App::bootstrap(
        transport.clone(),
        quiet_host(),
        Arc::new(MemoryTokenStore::with_token(FIXTURE_TOKEN)),
        None,
    )
    .await
}

/// Builds an app without any stored token.
#[allow(dead_code)]
pub async fn signed_out_app(transport: &Arc<ScriptedTransport>) -> App {
    App::bootstrap(
        transport.clone(),
        quiet_host(),
        Arc::new(MemoryTokenStore::new()),
        None,
    )
    .await
}

/// PDF upload of `size` bytes.
#[allow(dead_code)]
pub fn pdf(name: &str, size: usize) -> UploadFile {
    UploadFile::new(name, "application/pdf", vec![0x25; size])
}
