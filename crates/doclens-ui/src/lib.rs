#![warn(missing_docs)]
//! # doclens-ui
//!
//! ## Purpose
//! Defines the render-ready view state for `doclens`.
//!
//! ## Responsibilities
//! - Project session, upload-controller, and history state into [`UiState`].
//! - Order analysis sections for display and label urgency.
//! - Expose the drop-zone gate used by the upload view.
//!
//! ## Data flow
//! Store/controller snapshots -> `UiState::apply_*` reducers -> renderer.
//!
//! ## Ownership and lifetimes
//! `UiState` owns all strings so reducers never borrow from live snapshots.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Failure messages
//! arrive already rendered in the controller state.
//!
//! ## Security and privacy notes
//! UI state excludes tokens and API keys.

use doclens_analysis_contract::{AnalysisResult, HistoryEntry, UrgencyLevel};
use doclens_auth::SessionState;
use doclens_upload::{AnalysisRequestState, ControllerSnapshot};

/// UI-auth state projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAuthState {
    /// No session.
    SignedOut,
    /// Token restored, profile still loading.
    Restoring,
    /// Token and user present.
    SignedIn,
}

/// One rendered analysis section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    /// Section title.
    pub title: String,
    /// Section body.
    pub body: String,
}

/// Rendered analysis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    /// Analysed file.
    pub file_name: String,
    /// Mapped urgency.
    pub urgency: UrgencyLevel,
    /// One-line summary.
    pub summary: String,
    /// Non-empty sections in display order.
    pub sections: Vec<SectionView>,
    /// Suggested actions.
    pub actions_needed: Vec<String>,
    /// Suggested reply.
    pub response_template: Option<String>,
    /// Provider label.
    pub provider: Option<String>,
}

/// Upload view projection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadView {
    /// Spinner visible.
    pub loading: bool,
    /// Inline error text.
    pub error: Option<String>,
    /// Inline notice for a rejected selection.
    pub rejection: Option<String>,
    /// Selected file name.
    pub file_name: Option<String>,
    /// Image preview.
    pub preview_url: Option<String>,
    /// Result view, when it should be shown.
    pub result: Option<ResultView>,
}

/// Aggregate UI runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Current auth status.
    pub auth: UiAuthState,
    /// Signed-in user's display name.
    pub user_name: Option<String>,
    /// Whether the signed-in user has an analysis key.
    pub has_credential: bool,
    /// Whether an embedded host is present.
    pub embedded: bool,
    /// Upload view.
    pub upload: UploadView,
    /// History lines, newest first as delivered.
    pub history: Vec<String>,
}

impl UiState {
    /// Creates default UI state.
    pub fn new(version: impl Into<String>, embedded: bool) -> Self {
        Self {
            version: version.into(),
            auth: UiAuthState::SignedOut,
            user_name: None,
            has_credential: false,
            embedded,
            upload: UploadView::default(),
            history: Vec::new(),
        }
    }

    /// Applies a session snapshot.
    pub fn apply_session(&mut self, session: &SessionState) {
        match session {
            SessionState::Unauthenticated => {
                self.auth = UiAuthState::SignedOut;
                self.user_name = None;
                self.has_credential = false;
                self.history.clear();
            }
            SessionState::Restoring { .. } => {
                self.auth = UiAuthState::Restoring;
            }
            SessionState::Authenticated(session) => {
                self.auth = UiAuthState::SignedIn;
                self.user_name = Some(session.user.name.clone());
                self.has_credential = session.user.has_analysis_credential();
            }
        }
    }

    /// Applies an upload-controller snapshot.
    pub fn apply_upload(&mut self, snapshot: &ControllerSnapshot) {
        let selection = snapshot.selection.as_ref();
        self.upload = UploadView {
            loading: snapshot.request.is_pending(),
            error: match &snapshot.request {
                AnalysisRequestState::Failed(message) => Some(message.clone()),
                _ => None,
            },
            rejection: snapshot.last_rejection.clone(),
            file_name: selection.map(|selection| selection.name.clone()),
            preview_url: selection.and_then(|selection| selection.preview_url.clone()),
            result: match &snapshot.request {
                AnalysisRequestState::Succeeded(result) if snapshot.show_result => {
                    Some(project_result(result))
                }
                _ => None,
            },
        };
    }

    /// Replaces history lines.
    pub fn apply_history(&mut self, entries: &[HistoryEntry]) {
        self.history = entries.iter().map(history_line).collect();
    }

    /// Returns `true` when the drop zone should accept files.
    pub fn can_upload(&self) -> bool {
        self.auth == UiAuthState::SignedIn && self.has_credential && !self.upload.loading
    }
}

const FALLBACK_TITLES: [&str; 7] = [
    "Sender",
    "Document type",
    "Main content",
    "Key content",
    "Required actions",
    "Deadlines",
    "Consequences",
];

/// Builds the display form of an analysis.
///
/// Backend-formatted sections win, ordered by priority; otherwise the raw
/// section fields are used in a fixed order. Empty sections are dropped.
pub fn project_result(result: &AnalysisResult) -> ResultView {
    let analysis = &result.analysis;
    let mut sections: Vec<SectionView> = if analysis.formatted_sections.is_empty() {
        let bodies = [
            &analysis.sender,
            &analysis.letter_type,
            &analysis.main_content,
            &analysis.key_content,
            &analysis.required_actions,
            &analysis.deadlines,
            &analysis.consequences,
        ];
        FALLBACK_TITLES
            .iter()
            .zip(bodies)
            .map(|(title, body)| SectionView {
                title: (*title).to_string(),
                body: body.trim().to_string(),
            })
            .collect()
    } else {
        let mut formatted = analysis.formatted_sections.clone();
        formatted.sort_by_key(|section| section.priority);
        formatted
            .into_iter()
            .map(|section| SectionView {
                title: section.title,
                body: section.content.trim().to_string(),
            })
            .collect()
    };
    sections.retain(|section| !section.body.is_empty());

    ResultView {
        file_name: result.file_name.clone(),
        urgency: result.urgency(),
        summary: result.summary.clone(),
        sections,
        actions_needed: result.actions_needed.clone(),
        response_template: result.response_template.clone(),
        provider: result.llm_provider.clone(),
    }
}

/// Display label for an urgency level.
pub fn urgency_label(level: UrgencyLevel) -> &'static str {
    match level {
        UrgencyLevel::High => "High urgency",
        UrgencyLevel::Medium => "Medium urgency",
        UrgencyLevel::Low => "Low urgency",
        UrgencyLevel::Unknown => "Urgency unknown",
    }
}

/// One-line history rendering: `name · language · when`.
pub fn history_line(entry: &HistoryEntry) -> String {
    let mut parts = vec![entry.file_name.clone()];
    if let Some(language) = &entry.analysis_language {
        parts.push(language.clone());
    }
    if let Some(timestamp) = &entry.timestamp {
        parts.push(timestamp.clone());
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    //! Unit tests for UI gates and result projection.

    use doclens_analysis_contract::{AnalysisSections, FormattedSection};

    use super::*;

    fn result(sections: AnalysisSections) -> AnalysisResult {
        AnalysisResult {
            file_name: "letter.pdf".to_string(),
            analysis: sections,
            summary: String::new(),
            actions_needed: Vec::new(),
            urgency_level: Some("ВЫСОКИЙ".to_string()),
            response_template: None,
            llm_provider: None,
            analysis_language: None,
            file_type: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn upload_gate_requires_session_credential_and_idle() {
        let mut state = UiState::new("v0.1.0", false);
        assert!(!state.can_upload());

        state.auth = UiAuthState::SignedIn;
        assert!(!state.can_upload());

        state.has_credential = true;
        assert!(state.can_upload());

        state.upload.loading = true;
        assert!(!state.can_upload());
    }

    #[test]
    fn formatted_sections_sorted_by_priority() {
        let view = project_result(&result(AnalysisSections {
            formatted_sections: vec![
                FormattedSection {
                    title: "Deadlines".to_string(),
                    priority: 6,
                    content: "14 days".to_string(),
                    ..FormattedSection::default()
                },
                FormattedSection {
                    title: "Summary".to_string(),
                    priority: 1,
                    content: "Tax notice".to_string(),
                    ..FormattedSection::default()
                },
                FormattedSection {
                    title: "Empty".to_string(),
                    priority: 2,
                    content: "  ".to_string(),
                    ..FormattedSection::default()
                },
            ],
            ..AnalysisSections::default()
        }));

        let titles: Vec<&str> = view.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Summary", "Deadlines"]);
        assert_eq!(view.urgency, UrgencyLevel::High);
    }

    #[test]
    fn raw_sections_used_when_unformatted() {
        let view = project_result(&result(AnalysisSections {
            sender: "Finanzamt".to_string(),
            deadlines: "31.01".to_string(),
            ..AnalysisSections::default()
        }));

        let titles: Vec<&str> = view.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Sender", "Deadlines"]);
    }
}
