#![warn(missing_docs)]
//! # doclens-auth
//!
//! ## Purpose
//! Implements the session lifecycle and every authenticated backend call that
//! is not document analysis itself.
//!
//! ## Responsibilities
//! - Exchange a third-party credential for a [`Session`] and persist its token.
//! - Hold the session in one observable [`SessionStore`].
//! - Attach the bearer token to protected calls and force logout on any 401.
//! - Refresh/update the profile and manage analysis-provider credentials.
//!
//! ## Data flow
//! Identity provider credential -> [`AuthClient::login`] -> backend verify ->
//! [`SessionStore::establish`] -> subscribers. Every protected call goes
//! through [`AuthClient::send_authorized`], which reads the single shared
//! bearer token from the store.
//!
//! ## Ownership and lifetimes
//! The store is shared as `Arc<SessionStore>`; callers receive owned
//! snapshots, never references into the live state.
//!
//! ## Error model
//! Failures are [`AuthError`] values carrying a user-presentable message.
//! The only automatic side effect is 401 -> [`SessionStore::clear_if_token`]
//! for the token that request carried.
//!
//! ## Security and privacy notes
//! Tokens, credentials, and API keys are never logged. `Debug` output of
//! credential-bearing types is redacted.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use doclens_auth::{MemoryTokenStore, SessionState, SessionStore};
//!
//! let store = SessionStore::new(Arc::new(MemoryTokenStore::new()));
//! assert!(matches!(store.state(), SessionState::Unauthenticated));
//! ```

use std::fmt;
use std::sync::Arc;

use doclens_core::{
    ApiRequest, ApiResponse, BackendTransport, Session, TransportError, UserProfile, endpoints,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

mod store;

pub use store::{FileTokenStore, MemoryTokenStore, SessionState, SessionStore, TokenStore};

/// Fallback shown when sign-in fails without a backend message.
pub const LOGIN_FALLBACK_MESSAGE: &str = "Sign-in failed";
const PROFILE_UPDATE_FALLBACK: &str = "Could not update profile";
const API_KEYS_FALLBACK: &str = "Could not save API keys";
const CREDENTIAL_SETUP_FALLBACK: &str = "Could not save API key";
const CREDENTIAL_GENERATE_FALLBACK: &str = "Could not create API key";
const PROFILE_FALLBACK: &str = "Could not load profile";

/// Third-party credential handed over by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredential {
    /// Opaque credential (for Google, the ID token).
    pub credential: String,
}

impl ProviderCredential {
    /// Wraps a Google ID token.
    pub fn google(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderCredential(<redacted>)")
    }
}

/// Response of the credential exchange endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for protected calls.
    pub access_token: String,
    /// Token type, `bearer` in practice.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Signed-in user.
    pub user: UserProfile,
}

/// Editable profile fields. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New preferred analysis language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
}

/// Analysis-provider keys to store. Slot 1 is Gemini, 2 OpenAI, 3 Anthropic.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiKeyUpdate {
    /// Gemini key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_1: Option<String>,
    /// OpenAI key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_2: Option<String>,
    /// Anthropic key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_3: Option<String>,
}

impl ApiKeyUpdate {
    fn normalized(&self) -> Self {
        let keep = |key: &Option<String>| {
            key.as_ref()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
        };
        Self {
            api_key_1: keep(&self.api_key_1),
            api_key_2: keep(&self.api_key_2),
            api_key_3: keep(&self.api_key_3),
        }
    }

    fn is_empty(&self) -> bool {
        self.api_key_1.is_none() && self.api_key_2.is_none() && self.api_key_3.is_none()
    }
}

impl fmt::Debug for ApiKeyUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyUpdate")
            .field("api_key_1", &self.api_key_1.is_some())
            .field("api_key_2", &self.api_key_2.is_some())
            .field("api_key_3", &self.api_key_3.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

/// Result of a credential provisioning helper.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialSetupOutcome {
    /// Backend status tag (`success`, `existing`, `demo`, `active`, ...).
    #[serde(default)]
    pub status: String,
    /// Message to show the user.
    #[serde(default)]
    pub message: String,
    /// Masked form of the stored key, when reported.
    #[serde(default)]
    pub api_key_masked: Option<String>,
}

impl CredentialSetupOutcome {
    /// Returns `true` when the backend reports a usable key.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status.as_str(),
            "success" | "existing" | "demo" | "active"
        )
    }
}

/// Auth client bound to one transport and one session store.
#[derive(Clone)]
pub struct AuthClient {
    transport: Arc<dyn BackendTransport>,
    store: Arc<SessionStore>,
}

impl AuthClient {
    /// Creates a client.
    pub fn new(transport: Arc<dyn BackendTransport>, store: Arc<SessionStore>) -> Self {
        Self { transport, store }
    }

    /// Shared session store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Exchanges a provider credential for a session and persists its token.
    ///
    /// # Errors
    /// - [`AuthError::EmptyCredential`] for a blank credential (no request sent).
    /// - [`AuthError::Rejected`] with the backend `detail` or
    ///   [`LOGIN_FALLBACK_MESSAGE`].
    /// - [`AuthError::Transport`] when the backend is unreachable.
    /// - [`AuthError::InvalidResponse`] when the success body lacks a token.
    pub async fn login(&self, credential: &ProviderCredential) -> Result<Session, AuthError> {
        if credential.credential.trim().is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        let request = ApiRequest::post_json(
            endpoints::GOOGLE_VERIFY,
            json!({ "credential": credential.credential }),
        );
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "credential exchange rejected");
            return Err(rejected(&response, LOGIN_FALLBACK_MESSAGE));
        }

        let parsed: LoginResponse = response
            .decode()
            .map_err(|error| AuthError::InvalidResponse(error.to_string()))?;
        if parsed.access_token.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "response missing access token".to_string(),
            ));
        }

        let session = Session {
            token: parsed.access_token,
            user: parsed.user,
        };
        self.store.establish(session.clone())?;
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// Signs out locally. Never fails; repeated calls are no-ops.
    pub fn logout(&self) {
        self.store.clear();
        info!("signed out");
    }

    /// `true` iff a token and a user are both present.
    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Sends `request` with the current bearer token attached.
    ///
    /// A 401 response clears the session before the response is returned, so
    /// every protected call shares one logout path. The session is left alone
    /// when a newer token replaced the one this request carried.
    ///
    /// # Errors
    /// [`AuthError::NotAuthenticated`] when no token is held (nothing is sent)
    /// and [`AuthError::Transport`] when no response arrives.
    pub async fn send_authorized(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let token = self.store.bearer().ok_or(AuthError::NotAuthenticated)?;
        let path = request.path.clone();
        let response = self
            .transport
            .send(request.with_bearer(token.clone()))
            .await?;

        if response.status == 401 {
            if self.store.clear_if_token(&token) {
                warn!(%path, "backend rejected session token, signing out");
            } else {
                debug!(%path, "ignoring 401 for a token that is no longer current");
            }
        }

        Ok(response)
    }

    /// Re-fetches the profile for the stored token.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] after a 401 (the session is already
    /// cleared); other failures leave the session untouched.
    pub async fn refresh_profile(&self) -> Result<UserProfile, AuthError> {
        let token = self.store.bearer().ok_or(AuthError::NotAuthenticated)?;
        let profile: UserProfile = self
            .call_json(ApiRequest::get(endpoints::PROFILE), PROFILE_FALLBACK)
            .await?;

        if self.store.attach_user(&token, profile.clone()) {
            debug!(user_id = %profile.id, "profile refreshed");
        }
        Ok(profile)
    }

    /// Updates editable profile fields.
    ///
    /// # Errors
    /// Same as [`AuthClient::refresh_profile`].
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        let body = serde_json::to_value(update)
            .map_err(|error| AuthError::InvalidResponse(error.to_string()))?;
        let profile: UserProfile = self
            .call_json(
                ApiRequest::put_json(endpoints::PROFILE, body),
                PROFILE_UPDATE_FALLBACK,
            )
            .await?;

        let replacement = profile.clone();
        self.store.update_user(move |user| *user = replacement);
        Ok(profile)
    }

    /// Stores analysis-provider keys and returns the backend message.
    ///
    /// # Errors
    /// [`AuthError::EmptyCredential`] when every key is blank; otherwise as
    /// [`AuthClient::refresh_profile`].
    pub async fn save_api_keys(&self, keys: &ApiKeyUpdate) -> Result<String, AuthError> {
        let keys = keys.normalized();
        if keys.is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        let body = serde_json::to_value(&keys)
            .map_err(|error| AuthError::InvalidResponse(error.to_string()))?;
        let response: MessageResponse = self
            .call_json(
                ApiRequest::post_json(endpoints::API_KEYS, body),
                API_KEYS_FALLBACK,
            )
            .await?;

        self.store.update_user(|user| {
            user.has_gemini_api_key |= keys.api_key_1.is_some();
            user.has_openai_api_key |= keys.api_key_2.is_some();
            user.has_anthropic_api_key |= keys.api_key_3.is_some();
        });
        info!(?keys, "analysis credentials saved");
        Ok(response.message)
    }

    /// Validates and stores a Gemini key in one step.
    ///
    /// # Errors
    /// [`AuthError::EmptyCredential`] for a blank key; otherwise as
    /// [`AuthClient::refresh_profile`].
    pub async fn quick_credential_setup(
        &self,
        api_key: &str,
    ) -> Result<CredentialSetupOutcome, AuthError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        let outcome: CredentialSetupOutcome = self
            .call_json(
                ApiRequest::post_json(
                    endpoints::QUICK_GEMINI_SETUP,
                    json!({ "api_key": api_key }),
                ),
                CREDENTIAL_SETUP_FALLBACK,
            )
            .await?;

        if outcome.status == "success" {
            self.store.update_user(|user| user.has_gemini_api_key = true);
        }
        Ok(outcome)
    }

    /// Asks the backend to provision a Gemini key for the user.
    ///
    /// # Errors
    /// As [`AuthClient::refresh_profile`].
    pub async fn auto_generate_credential(&self) -> Result<CredentialSetupOutcome, AuthError> {
        let outcome: CredentialSetupOutcome = self
            .call_json(
                ApiRequest::post_json(endpoints::AUTO_GENERATE_GEMINI_KEY, json!({})),
                CREDENTIAL_GENERATE_FALLBACK,
            )
            .await?;

        if outcome.is_active() {
            self.store.update_user(|user| user.has_gemini_api_key = true);
        }
        Ok(outcome)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        fallback: &str,
    ) -> Result<T, AuthError> {
        let response = self.send_authorized(request).await?;
        if response.status == 401 {
            return Err(AuthError::Unauthorized);
        }
        if !response.is_success() {
            return Err(rejected(&response, fallback));
        }

        response
            .decode()
            .map_err(|error| AuthError::InvalidResponse(error.to_string()))
    }
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClient")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

fn rejected(response: &ApiResponse, fallback: &str) -> AuthError {
    AuthError::Rejected {
        status: response.status,
        message: response.detail().unwrap_or_else(|| fallback.to_string()),
    }
}

/// Errors produced by session and account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential or key was blank; nothing was sent.
    #[error("credential must be non-empty")]
    EmptyCredential,
    /// Operation needs a session but none is held.
    #[error("not signed in")]
    NotAuthenticated,
    /// Backend answered 401; the session has been cleared.
    #[error("session expired, please sign in again")]
    Unauthorized,
    /// Backend rejected the call with a message.
    #[error("{message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Backend `detail` or a fallback.
        message: String,
    },
    /// No response was received.
    #[error("connection error: {0}")]
    Transport(#[from] TransportError),
    /// Success body violated the expected shape.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
    /// Durable token slot failure.
    #[error("token storage failure: {0}")]
    Store(String),
}
