#![warn(missing_docs)]
//! # doclens-core
//!
//! ## Purpose
//! Defines the pure data model and the backend transport port shared across
//! the `doclens` workspace.
//!
//! ## Responsibilities
//! - Represent sessions, user profiles, and uploaded files.
//! - Validate upload candidates (type allow-list, 10 MiB size ceiling).
//! - Build the single [`PendingUpload`] held by an upload controller,
//!   including the optional image preview and content fingerprint.
//! - Describe backend requests/responses and the [`BackendTransport`] trait.
//!
//! ## Data flow
//! A picker or drop target produces an [`UploadFile`]. [`validate_upload`]
//! classifies it into a [`FileKind`], and [`PendingUpload::new`] wraps it for
//! the analysis lifecycle, which ships it inside an [`ApiRequest`].
//!
//! ## Ownership and lifetimes
//! Files own their byte buffers (`Vec<u8>`) so an upload can move into an
//! async request without borrowing from the selection event.
//!
//! ## Error model
//! Local validation failures return [`ValidationError`]; transport failures
//! without any HTTP response return [`TransportError`].
//!
//! ## Security and privacy notes
//! [`Session`] redacts its token in `Debug` output. File contents are never
//! logged; callers log the SHA-256 [`PendingUpload::fingerprint`] instead.
//!
//! ## Example
//! ```rust
//! use doclens_core::{validate_upload, FileKind, UploadFile};
//!
//! let file = UploadFile::new("letter.pdf", "application/pdf", vec![0; 1024]);
//! assert_eq!(validate_upload(&file).unwrap(), FileKind::Pdf);
//! ```

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

mod transport;

pub use transport::{
    ApiRequest, ApiResponse, BackendTransport, HttpMethod, MultipartForm, RequestBody,
    TransportError, endpoints,
};

/// Largest accepted upload, in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Well-known key of the durable token slot.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// User profile as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend user identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Account email.
    #[serde(default)]
    pub email: String,
    /// Avatar URL.
    #[serde(default)]
    pub picture: Option<String>,
    /// Identity provider that created the account.
    #[serde(default)]
    pub oauth_provider: Option<String>,
    /// Whether a Gemini key is stored for the user.
    #[serde(default)]
    pub has_gemini_api_key: bool,
    /// Whether an OpenAI key is stored for the user.
    #[serde(default)]
    pub has_openai_api_key: bool,
    /// Whether an Anthropic key is stored for the user.
    #[serde(default)]
    pub has_anthropic_api_key: bool,
    /// Preferred analysis language, if the user set one.
    #[serde(default)]
    pub preferred_language: Option<String>,
}

impl UserProfile {
    /// Returns `true` when at least one analysis provider key is configured.
    pub fn has_analysis_credential(&self) -> bool {
        self.has_gemini_api_key || self.has_openai_api_key || self.has_anthropic_api_key
    }
}

/// Authenticated identity plus the bearer token for protected calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// Profile of the signed-in user.
    pub user: UserProfile,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Accepted document categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// `application/pdf`.
    Pdf,
    /// Any `image/*` type.
    Image,
    /// `text/plain`.
    Text,
}

/// One file chosen by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Original file name.
    pub name: String,
    /// MIME type reported by the picker (or inferred from the extension).
    pub mime_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Creates a file value. A blank MIME type is inferred from the name.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mut mime_type = mime_type.into();
        if mime_type.trim().is_empty() {
            mime_type = mime_from_extension(&name).unwrap_or_default().to_string();
        }

        Self {
            name,
            mime_type,
            bytes,
        }
    }

    /// Reads a file from disk, inferring its MIME type from the extension.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, "", bytes))
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Maps a MIME type onto an accepted [`FileKind`].
pub fn classify_mime(mime_type: &str) -> Option<FileKind> {
    let normalized = mime_type.trim().to_ascii_lowercase();
    let essence = normalized.split(';').next().unwrap_or_default().trim();

    match essence {
        "application/pdf" => Some(FileKind::Pdf),
        "text/plain" => Some(FileKind::Text),
        other if other.starts_with("image/") && other.len() > "image/".len() => {
            Some(FileKind::Image)
        }
        _ => None,
    }
}

/// Infers a MIME type from the extensions the picker offers.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Validates a selection against the type allow-list and size ceiling.
///
/// # Errors
/// Returns [`ValidationError::UnsupportedType`] for MIME types outside
/// `{application/pdf, image/*, text/plain}` and [`ValidationError::TooLarge`]
/// above [`MAX_UPLOAD_BYTES`].
pub fn validate_upload(file: &UploadFile) -> Result<FileKind, ValidationError> {
    let kind = classify_mime(&file.mime_type)
        .ok_or_else(|| ValidationError::UnsupportedType(file.mime_type.clone()))?;

    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            limit: MAX_UPLOAD_BYTES,
        });
    }

    Ok(kind)
}

/// The single active selection of an upload controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    /// Selected file.
    pub file: UploadFile,
    /// Validated category.
    pub kind: FileKind,
    /// `data:` URL preview, images only.
    pub preview_url: Option<String>,
    /// Lowercase hex SHA-256 of the file contents.
    pub fingerprint: String,
}

impl PendingUpload {
    /// Validates `file` and derives preview and fingerprint.
    ///
    /// # Errors
    /// Propagates [`validate_upload`] failures.
    pub fn new(file: UploadFile) -> Result<Self, ValidationError> {
        let kind = validate_upload(&file)?;
        let preview_url = match kind {
            FileKind::Image => Some(preview_data_url(&file)),
            FileKind::Pdf | FileKind::Text => None,
        };
        let fingerprint = file_fingerprint(&file.bytes);

        Ok(Self {
            file,
            kind,
            preview_url,
            fingerprint,
        })
    }
}

/// Encodes a file as a `data:` URL for local previews.
pub fn preview_data_url(file: &UploadFile) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&file.bytes);
    format!("data:{};base64,{encoded}", file.mime_type)
}

/// Computes the lowercase hex SHA-256 digest of `bytes`.
pub fn file_fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Local upload validation failures. These never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// MIME type outside the allow-list.
    #[error("unsupported file type: {0:?}")]
    UnsupportedType(String),
    /// File exceeds the size ceiling.
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Maximum accepted size in bytes.
        limit: u64,
    },
}
