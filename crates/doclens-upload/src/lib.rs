#![warn(missing_docs)]
//! # doclens-upload
//!
//! ## Purpose
//! Owns the upload-and-analysis workflow: one selected file, one analysis
//! request at a time, and the state the UI derives from it.
//!
//! ## Responsibilities
//! - Accept a single file, validate it locally, and keep it as the active
//!   [`PendingUpload`].
//! - Refuse new selections while a request is pending.
//! - Run pre-flight checks (session, analysis credential) without network.
//! - Issue the multipart analysis call and map its outcome to
//!   [`AnalysisRequestState`].
//! - Emit host feedback for every user-facing transition.
//! - Load analysis history on demand ([`HistoryController`]).
//!
//! ## Data flow
//! [`UploadController::select_file`] -> validation -> pre-flight ->
//! `Pending` -> [`AuthClient::send_authorized`] -> response mapping ->
//! `Succeeded`/`Failed` -> [`ControllerSnapshot`] subscribers.
//!
//! ## Ownership and lifetimes
//! Controller state sits behind a `std::sync::Mutex` that is never held
//! across an `.await`; snapshots are owned clones.
//!
//! ## Error model
//! Nothing here returns an error: every failure becomes a terminal
//! `Failed(message)` or a [`SelectionOutcome::Rejected`].
//!
//! ## Security and privacy notes
//! Files are logged by name, size, and SHA-256 fingerprint only.

use std::sync::{Arc, Mutex, MutexGuard};

use doclens_analysis_contract::{
    AnalysisContractError, AnalysisFailure, AnalysisResult, classify_failure_response,
    parse_analysis_response,
};
use doclens_auth::{AuthClient, AuthError};
use doclens_core::{
    ApiRequest, ApiResponse, FileKind, MAX_UPLOAD_BYTES, MultipartForm, PendingUpload,
    UploadFile, ValidationError, endpoints,
};
use doclens_host::{Feedback, HostBridge, announce};
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod history;

pub use history::HistoryController;

/// Message announced after a successful analysis.
pub const ANALYSIS_SUCCESS_MESSAGE: &str = "Analysis complete";

/// Lifecycle of the analysis request owned by one controller.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisRequestState {
    /// Nothing in flight and nothing to show.
    Idle,
    /// Request sent, awaiting the backend.
    Pending {
        /// File being analysed.
        file_name: String,
    },
    /// Backend returned an analysis.
    Succeeded(AnalysisResult),
    /// Request failed; the message is user-presentable.
    Failed(String),
}

impl AnalysisRequestState {
    /// `true` while a request is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, AnalysisRequestState::Pending { .. })
    }
}

/// What happened to one call of [`UploadController::select_file`].
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// A request is already pending; the selection was ignored.
    Busy,
    /// Local validation rejected the file; nothing was sent.
    Rejected(ValidationError),
    /// The selection ran to a terminal state.
    Completed(AnalysisRequestState),
}

/// Render-safe summary of the active selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Category.
    pub kind: FileKind,
    /// Image preview as a `data:` URL.
    pub preview_url: Option<String>,
    /// SHA-256 fingerprint.
    pub fingerprint: String,
}

/// Observable controller state.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    /// Request lifecycle.
    pub request: AnalysisRequestState,
    /// Active selection, if any.
    pub selection: Option<SelectionSummary>,
    /// Whether the result view should be shown.
    pub show_result: bool,
    /// Message for the most recent rejected selection.
    pub last_rejection: Option<String>,
}

#[derive(Debug)]
struct ControllerInner {
    request: AnalysisRequestState,
    pending: Option<PendingUpload>,
    show_result: bool,
    last_rejection: Option<String>,
}

impl ControllerInner {
    fn idle() -> Self {
        Self {
            request: AnalysisRequestState::Idle,
            pending: None,
            show_result: false,
            last_rejection: None,
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            request: self.request.clone(),
            selection: self.pending.as_ref().map(|pending| SelectionSummary {
                name: pending.file.name.clone(),
                size: pending.file.size(),
                kind: pending.kind,
                preview_url: pending.preview_url.clone(),
                fingerprint: pending.fingerprint.clone(),
            }),
            show_result: self.show_result,
            last_rejection: self.last_rejection.clone(),
        }
    }
}

enum Start {
    Send(MultipartForm),
    Finished(SelectionOutcome, Option<Feedback>),
}

/// Upload controller enforcing at most one in-flight analysis.
pub struct UploadController {
    auth: AuthClient,
    host: Arc<dyn HostBridge>,
    language: Option<String>,
    inner: Mutex<ControllerInner>,
    updates: watch::Sender<ControllerSnapshot>,
}

impl UploadController {
    /// Creates an idle controller.
    ///
    /// `language` overrides the user's preferred analysis language.
    pub fn new(auth: AuthClient, host: Arc<dyn HostBridge>, language: Option<String>) -> Self {
        let inner = ControllerInner::idle();
        let (updates, _) = watch::channel(inner.snapshot());
        Self {
            auth,
            host,
            language,
            inner: Mutex::new(inner),
            updates,
        }
    }

    /// Current request state.
    pub fn state(&self) -> AnalysisRequestState {
        self.lock().request.clone()
    }

    /// Full observable state.
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.lock().snapshot()
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.updates.subscribe()
    }

    /// Accepts `file` and runs the analysis to a terminal state.
    ///
    /// Ignored while a request is pending; the pending request's caller still
    /// receives its own result.
    pub async fn select_file(&self, file: UploadFile) -> SelectionOutcome {
        let form = match self.start(file) {
            Start::Send(form) => form,
            Start::Finished(outcome, feedback) => {
                if let Some(feedback) = feedback {
                    announce(self.host.as_ref(), &feedback);
                }
                return outcome;
            }
        };
        let mut guard = PendingGuard {
            controller: self,
            armed: true,
        };
        announce(self.host.as_ref(), &Feedback::Started);

        let file_name = form.file.name.clone();
        let response = self
            .auth
            .send_authorized(ApiRequest::post_multipart(endpoints::ANALYZE_FILE, form))
            .await;

        let (state, feedback) = match interpret_response(response) {
            Ok(result) => {
                info!(%file_name, "analysis succeeded");
                (
                    AnalysisRequestState::Succeeded(result),
                    Feedback::Succeeded(ANALYSIS_SUCCESS_MESSAGE.to_string()),
                )
            }
            Err(failure) => {
                warn!(%file_name, ?failure, "analysis failed");
                failure_transition(&failure)
            }
        };

        guard.armed = false;
        {
            let mut inner = self.lock();
            inner.request = state.clone();
            inner.show_result = matches!(state, AnalysisRequestState::Succeeded(_));
            self.publish(&inner);
        }
        announce(self.host.as_ref(), &feedback);

        SelectionOutcome::Completed(state)
    }

    /// Clears the selection and any terminal state.
    ///
    /// Returns `false` without changes while a request is pending: in-flight
    /// requests cannot be cancelled.
    pub fn reset(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.request.is_pending() {
                debug!("reset ignored while analysis is pending");
                return false;
            }
            *inner = ControllerInner::idle();
            self.publish(&inner);
        }
        announce(self.host.as_ref(), &Feedback::Reset);
        true
    }

    fn start(&self, file: UploadFile) -> Start {
        let mut inner = self.lock();
        if inner.request.is_pending() {
            debug!(file_name = %file.name, "selection ignored while analysis is pending");
            return Start::Finished(SelectionOutcome::Busy, None);
        }

        let pending = match PendingUpload::new(file) {
            Ok(pending) => pending,
            Err(error) => {
                let message = rejection_message(&error);
                debug!(%error, "selection rejected");
                inner.last_rejection = Some(message.clone());
                self.publish(&inner);
                return Start::Finished(
                    SelectionOutcome::Rejected(error),
                    Some(Feedback::Warning(message)),
                );
            }
        };

        info!(
            file_name = %pending.file.name,
            size = pending.file.size(),
            fingerprint = %pending.fingerprint,
            "file accepted"
        );
        let file = pending.file.clone();
        let file_name = pending.file.name.clone();
        inner.pending = Some(pending);
        inner.show_result = false;
        inner.last_rejection = None;

        let user = self.auth.store().current_user();
        let preflight = match &user {
            None => Some(AnalysisFailure::Unauthorized),
            Some(user) if !user.has_analysis_credential() => {
                Some(AnalysisFailure::MissingCredential)
            }
            Some(_) => None,
        };
        if let Some(failure) = preflight {
            warn!(%file_name, ?failure, "analysis blocked before sending");
            let (state, feedback) = failure_transition(&failure);
            inner.request = state.clone();
            self.publish(&inner);
            return Start::Finished(SelectionOutcome::Completed(state), Some(feedback));
        }

        inner.request = AnalysisRequestState::Pending { file_name };
        self.publish(&inner);

        let language = self
            .language
            .clone()
            .or_else(|| user.and_then(|user| user.preferred_language));
        let fields = language
            .map(|language| vec![("language".to_string(), language)])
            .unwrap_or_default();
        Start::Send(MultipartForm { file, fields })
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        // State is replaced wholesale on every transition, so a poisoned
        // guard still holds a consistent value.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &ControllerInner) {
        self.updates.send_replace(inner.snapshot());
    }
}

/// Fails a pending request whose `select_file` future was dropped before
/// the backend answered.
struct PendingGuard<'a> {
    controller: &'a UploadController,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let message = AnalysisFailure::Connection.message();
        {
            let mut inner = self.controller.lock();
            if !inner.request.is_pending() {
                return;
            }
            warn!("analysis abandoned before the backend answered");
            inner.request = AnalysisRequestState::Failed(message.clone());
            inner.show_result = false;
            self.controller.publish(&inner);
        }
        announce(self.controller.host.as_ref(), &Feedback::Failed(message));
    }
}

fn interpret_response(
    response: Result<ApiResponse, AuthError>,
) -> Result<AnalysisResult, AnalysisFailure> {
    let response = response.map_err(|error| match error {
        AuthError::Transport(_) => AnalysisFailure::Connection,
        AuthError::NotAuthenticated | AuthError::Unauthorized => AnalysisFailure::Unauthorized,
        _ => AnalysisFailure::Generic,
    })?;

    if !response.is_success() {
        return Err(classify_failure_response(
            response.status,
            response.detail().as_deref(),
        ));
    }

    parse_analysis_response(&response.body).map_err(|error| match error {
        AnalysisContractError::MissingAnalysis
        | AnalysisContractError::Decode(_)
        | AnalysisContractError::InvalidContract(_) => AnalysisFailure::MissingAnalysis,
    })
}

fn failure_transition(failure: &AnalysisFailure) -> (AnalysisRequestState, Feedback) {
    let message = failure.message();
    let feedback = if matches!(failure, AnalysisFailure::MissingCredential) {
        Feedback::Warning(message.clone())
    } else {
        Feedback::Failed(message.clone())
    };
    (AnalysisRequestState::Failed(message), feedback)
}

/// User-visible text for a rejected selection.
pub fn rejection_message(error: &ValidationError) -> String {
    match error {
        ValidationError::UnsupportedType(_) => {
            "Unsupported file type, choose a PDF, image, or text file".to_string()
        }
        ValidationError::TooLarge { .. } => format!(
            "File is too large, the limit is {} MB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        ),
    }
}
