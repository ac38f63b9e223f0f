//! Backend request/response model and the transport port.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::UploadFile;

/// Backend endpoint paths, relative to the configured base URL.
pub mod endpoints {
    /// Exchange a third-party credential for a session.
    pub const GOOGLE_VERIFY: &str = "/api/auth/google/verify";
    /// Read or update the current profile.
    pub const PROFILE: &str = "/api/profile";
    /// Store analysis-provider credentials.
    pub const API_KEYS: &str = "/api/api-keys";
    /// Multipart document analysis.
    pub const ANALYZE_FILE: &str = "/api/analyze-file";
    /// Past analyses of the current user.
    pub const ANALYSIS_HISTORY: &str = "/api/analysis-history";
    /// Validate and store a Gemini key in one step.
    pub const QUICK_GEMINI_SETUP: &str = "/api/quick-gemini-setup";
    /// Ask the backend to provision a Gemini key.
    pub const AUTO_GENERATE_GEMINI_KEY: &str = "/api/auto-generate-gemini-key";
}

/// HTTP methods used against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`.
    Get,
    /// `POST`.
    Post,
    /// `PUT`.
    Put,
}

/// Multipart body for file analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    /// File part, sent under the `file` field.
    pub file: UploadFile,
    /// Additional text fields, in order.
    pub fields: Vec<(String, String)>,
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON document.
    Json(Value),
    /// `multipart/form-data`.
    Multipart(MultipartForm),
}

/// One backend call.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path from [`endpoints`].
    pub path: String,
    /// Bearer token for the `Authorization` header.
    pub bearer: Option<String>,
    /// Request body.
    pub body: RequestBody,
}

impl ApiRequest {
    /// `GET` without a body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    /// `POST` with a JSON body.
    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            bearer: None,
            body: RequestBody::Json(body),
        }
    }

    /// `PUT` with a JSON body.
    pub fn put_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            bearer: None,
            body: RequestBody::Json(body),
        }
    }

    /// `POST` with a multipart body.
    pub fn post_multipart(path: impl Into<String>, form: MultipartForm) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            bearer: None,
            body: RequestBody::Multipart(form),
        }
    }

    /// Returns the request with `token` attached as bearer.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Builds a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    /// Returns the decode error for malformed bodies.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Extracts the backend-supplied `detail` message, if any.
    ///
    /// Accepts a plain string or a list of validation objects carrying `msg`.
    pub fn detail(&self) -> Option<String> {
        let value: Value = serde_json::from_slice(&self.body).ok()?;
        match value.get("detail")? {
            Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
            Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            _ => None,
        }
    }
}

/// Failures where no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established or was dropped.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    /// The transport gave up waiting for a response.
    #[error("backend request timed out")]
    Timeout,
}

/// Port through which every backend call is issued.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Sends one request and returns the raw response, whatever its status.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}
