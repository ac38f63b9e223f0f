#![warn(missing_docs)]
//! # doclens-analysis-contract
//!
//! ## Purpose
//! Defines the backend analysis response schema and the client-side mapping
//! from failed requests to user-visible messages.
//!
//! ## Responsibilities
//! - Parse analysis, history, and failure payloads.
//! - Map free-form urgency tags to a UI-safe [`UrgencyLevel`].
//! - Classify failures into [`AnalysisFailure`] with stable messages.
//! - Preserve unknown response fields for forward compatibility.
//!
//! ## Data flow
//! Raw response bytes -> [`parse_analysis_response`] -> [`AnalysisResult`] ->
//! view-model projection. Non-2xx responses -> [`classify_failure_response`]
//! -> [`AnalysisFailure::message`].
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs to avoid borrowing from transient network
//! buffers.
//!
//! ## Error model
//! Invalid JSON, a missing `analysis` object, or a blank `file_name` return
//! [`AnalysisContractError`].
//!
//! ## Security and privacy notes
//! This crate handles model output only; it never sees tokens or API keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Analysis payload returned by `POST /api/analyze-file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Name of the analysed file, echoed by the backend.
    pub file_name: String,
    /// Structured analysis sections.
    pub analysis: AnalysisSections,
    /// One-line summary.
    #[serde(default)]
    pub summary: String,
    /// Suggested follow-up actions.
    #[serde(default)]
    pub actions_needed: Vec<String>,
    /// Free-form urgency tag (see [`UrgencyLevel::from_tag`]).
    #[serde(default)]
    pub urgency_level: Option<String>,
    /// Suggested reply text.
    #[serde(default)]
    pub response_template: Option<String>,
    /// Provider that produced the analysis.
    #[serde(default)]
    pub llm_provider: Option<String>,
    /// Language the analysis was written in.
    #[serde(default)]
    pub analysis_language: Option<String>,
    /// `image` or `document`.
    #[serde(default)]
    pub file_type: Option<String>,
    /// Fields this client does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AnalysisResult {
    /// Mapped urgency of the analysed document.
    pub fn urgency(&self) -> UrgencyLevel {
        self.urgency_level
            .as_deref()
            .map(UrgencyLevel::from_tag)
            .unwrap_or(UrgencyLevel::Unknown)
    }
}

/// Free-text sections of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSections {
    /// Sender information.
    pub sender: String,
    /// Document/letter type.
    pub letter_type: String,
    /// Main content digest.
    pub main_content: String,
    /// Full analysis text.
    pub full_analysis: String,
    /// Key content.
    pub key_content: String,
    /// Actions the reader must take.
    pub required_actions: String,
    /// Deadlines mentioned in the document.
    pub deadlines: String,
    /// Consequences of inaction.
    pub consequences: String,
    /// Pre-formatted display sections.
    pub formatted_sections: Vec<FormattedSection>,
}

/// One display-ready section produced by the backend formatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormattedSection {
    /// Section key (`summary`, `sender`, `deadlines`, ...).
    pub key: String,
    /// Display title.
    pub title: String,
    /// Icon glyph.
    pub icon: String,
    /// Accent color name.
    pub color: String,
    /// Sort priority, ascending.
    pub priority: u32,
    /// Section body.
    pub content: String,
}

/// UI-safe urgency abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrgencyLevel {
    /// Tag missing or unrecognized.
    Unknown,
    /// Can wait.
    Low,
    /// Default backend level.
    Medium,
    /// Needs prompt attention.
    High,
}

impl UrgencyLevel {
    /// Maps a backend urgency tag (Russian or English) onto a level.
    pub fn from_tag(tag: &str) -> Self {
        let lower = tag.trim().to_lowercase();
        if lower.is_empty() {
            return UrgencyLevel::Unknown;
        }
        // "not urgent" must be checked before "urgent".
        if ["низкий", "несрочно", "low", "not urgent"]
            .iter()
            .any(|keyword| lower.contains(keyword))
        {
            return UrgencyLevel::Low;
        }
        if ["высокий", "срочно", "критичн", "high", "urgent", "critical"]
            .iter()
            .any(|keyword| lower.contains(keyword))
        {
            return UrgencyLevel::High;
        }
        if ["средний", "medium"]
            .iter()
            .any(|keyword| lower.contains(keyword))
        {
            return UrgencyLevel::Medium;
        }
        UrgencyLevel::Unknown
    }
}

/// Past analysis as listed by `GET /api/analysis-history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Analysis identifier.
    #[serde(default)]
    pub id: String,
    /// Analysed file name.
    pub file_name: String,
    /// `image` or `document`.
    #[serde(default)]
    pub file_type: Option<String>,
    /// Analysis language.
    #[serde(default)]
    pub analysis_language: Option<String>,
    /// Provider used.
    #[serde(default)]
    pub llm_provider: Option<String>,
    /// Backend timestamp, as sent.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Full stored result, when the backend includes it.
    #[serde(default)]
    pub analysis_result: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    analyses: Vec<HistoryEntry>,
}

/// Parses a successful analysis body.
///
/// # Errors
/// - [`AnalysisContractError::Decode`] for invalid JSON.
/// - [`AnalysisContractError::MissingAnalysis`] when `analysis` is absent or
///   null.
/// - [`AnalysisContractError::InvalidContract`] when `file_name` is blank.
pub fn parse_analysis_response(raw: &[u8]) -> Result<AnalysisResult, AnalysisContractError> {
    let value: Value = serde_json::from_slice(raw).map_err(AnalysisContractError::Decode)?;

    match value.get("analysis") {
        None | Some(Value::Null) => return Err(AnalysisContractError::MissingAnalysis),
        Some(_) => {}
    }

    let parsed: AnalysisResult =
        serde_json::from_value(value).map_err(AnalysisContractError::Decode)?;

    if parsed.file_name.trim().is_empty() {
        return Err(AnalysisContractError::InvalidContract(
            "file_name is empty".to_string(),
        ));
    }

    Ok(parsed)
}

/// Parses a successful history body.
///
/// # Errors
/// Returns [`AnalysisContractError::Decode`] for invalid JSON.
pub fn parse_history_response(raw: &[u8]) -> Result<Vec<HistoryEntry>, AnalysisContractError> {
    let envelope: HistoryEnvelope =
        serde_json::from_slice(raw).map_err(AnalysisContractError::Decode)?;
    Ok(envelope.analyses)
}

/// Shown when an analysis is attempted without a provider key.
pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "Add an analysis API key in your profile before uploading documents";
/// Shown after a 401.
pub const AUTH_ERROR_MESSAGE: &str = "Authentication error, please sign in again";
/// Shown for a 400 that mentions the API key.
pub const INVALID_CREDENTIAL_MESSAGE: &str = "Invalid or missing API key";
/// Shown for any other 400.
pub const INVALID_FILE_MESSAGE: &str = "Invalid file format or data error";
/// Shown when no response was received.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error, check your network and try again";
/// Shown when a success response carries no analysis.
pub const MISSING_ANALYSIS_MESSAGE: &str = "Analysis failed: no data in response";
/// Fallback for everything else.
pub const GENERIC_FAILURE_MESSAGE: &str = "Analysis failed, please try again";

/// Why an analysis did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisFailure {
    /// User has no provider key; detected before sending.
    MissingCredential,
    /// 401, or no session at all.
    Unauthorized,
    /// 400 mentioning the API key.
    InvalidCredential,
    /// Other 400.
    InvalidFile,
    /// Non-2xx with a backend detail message.
    Backend(String),
    /// No response received.
    Connection,
    /// Success status without an analysis payload.
    MissingAnalysis,
    /// Anything else.
    Generic,
}

impl AnalysisFailure {
    /// User-visible message.
    pub fn message(&self) -> String {
        match self {
            AnalysisFailure::MissingCredential => MISSING_CREDENTIAL_MESSAGE.to_string(),
            AnalysisFailure::Unauthorized => AUTH_ERROR_MESSAGE.to_string(),
            AnalysisFailure::InvalidCredential => INVALID_CREDENTIAL_MESSAGE.to_string(),
            AnalysisFailure::InvalidFile => INVALID_FILE_MESSAGE.to_string(),
            AnalysisFailure::Backend(detail) => detail.clone(),
            AnalysisFailure::Connection => CONNECTION_ERROR_MESSAGE.to_string(),
            AnalysisFailure::MissingAnalysis => MISSING_ANALYSIS_MESSAGE.to_string(),
            AnalysisFailure::Generic => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Classifies a non-2xx analysis response.
///
/// 401 and 400 map to fixed categories (a 400 is a credential problem when
/// its detail mentions `API`); other statuses surface the backend detail,
/// falling back to [`AnalysisFailure::Generic`].
pub fn classify_failure_response(status: u16, detail: Option<&str>) -> AnalysisFailure {
    let detail = detail.map(str::trim).filter(|detail| !detail.is_empty());

    match status {
        401 => AnalysisFailure::Unauthorized,
        400 if detail.is_some_and(|detail| detail.contains("API")) => {
            AnalysisFailure::InvalidCredential
        }
        400 => AnalysisFailure::InvalidFile,
        _ => match detail {
            Some(detail) => AnalysisFailure::Backend(detail.to_string()),
            None => AnalysisFailure::Generic,
        },
    }
}

/// Analysis contract errors.
#[derive(Debug, Error)]
pub enum AnalysisContractError {
    /// JSON decode failure.
    #[error("analysis decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Success body lacks the `analysis` object.
    #[error("analysis payload missing")]
    MissingAnalysis,
    /// Parsed payload violates contract invariants.
    #[error("analysis contract violation: {0}")]
    InvalidContract(String),
}
