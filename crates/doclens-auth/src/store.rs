//! Durable token slot and the observable session store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use doclens_core::{AUTH_TOKEN_KEY, Session, UserProfile};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::AuthError;

/// Durable client-side slot holding at most one token.
pub trait TokenStore: Send + Sync {
    /// Reads the persisted token. Blank contents count as absent.
    fn load(&self) -> Result<Option<String>, AuthError>;

    /// Persists `token`, replacing any previous value.
    fn save(&self, token: &str) -> Result<(), AuthError>;

    /// Removes the persisted token. Removing an absent token succeeds.
    fn clear(&self) -> Result<(), AuthError>;
}

/// Process-local slot, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot pre-filled with `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, AuthError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| AuthError::Store("token slot lock poisoned".to_string()))?;
        Ok(slot.clone().filter(|token| !token.trim().is_empty()))
    }

    fn save(&self, token: &str) -> Result<(), AuthError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AuthError::Store("token slot lock poisoned".to_string()))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AuthError::Store("token slot lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}

/// File-backed slot named [`AUTH_TOKEN_KEY`] inside a state directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Creates a store rooted at `state_dir`. The directory is created lazily.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(AUTH_TOKEN_KEY),
        }
    }

    /// Path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, AuthError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(AuthError::Store(format!("read token slot: {error}"))),
        }
    }

    fn save(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| AuthError::Store(format!("create state dir: {error}")))?;
        }
        std::fs::write(&self.path, token)
            .map_err(|error| AuthError::Store(format!("write token slot: {error}")))
    }

    fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(AuthError::Store(format!("remove token slot: {error}"))),
        }
    }
}

/// Session lifecycle as seen by the rest of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No token and no user.
    Unauthenticated,
    /// A persisted token was found; the profile has not been confirmed yet.
    Restoring {
        /// Token read from the durable slot.
        token: String,
    },
    /// Token and user are both present.
    Authenticated(Session),
}

impl SessionState {
    /// Token used for the `Authorization` header, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Restoring { token } => Some(token),
            SessionState::Authenticated(session) => Some(&session.token),
        }
    }

    /// Signed-in user, if confirmed.
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated(session) => Some(&session.user),
            SessionState::Unauthenticated | SessionState::Restoring { .. } => None,
        }
    }
}

/// Single owned store for the current session with change notification.
pub struct SessionStore {
    tokens: Arc<dyn TokenStore>,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    /// Creates an unauthenticated store backed by `tokens`.
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self { tokens, state }
    }

    /// Loads the persisted token, if any, into the `Restoring` state.
    ///
    /// Returns `true` when a token was found. Unreadable slots are logged and
    /// treated as empty.
    pub fn restore(&self) -> bool {
        match self.tokens.load() {
            Ok(Some(token)) => {
                debug!("restored persisted session token");
                self.state.send_replace(SessionState::Restoring { token });
                true
            }
            Ok(None) => false,
            Err(error) => {
                warn!(%error, "token slot unreadable, starting signed out");
                false
            }
        }
    }

    /// Persists the session token and publishes the authenticated state.
    ///
    /// # Errors
    /// Returns [`AuthError::Store`] when the token cannot be persisted; the
    /// in-memory state is left unchanged in that case.
    pub fn establish(&self, session: Session) -> Result<(), AuthError> {
        self.tokens.save(&session.token)?;
        self.state.send_replace(SessionState::Authenticated(session));
        Ok(())
    }

    /// Clears the durable slot and the in-memory session. Never fails.
    pub fn clear(&self) {
        if let Err(error) = self.tokens.clear() {
            warn!(%error, "failed to clear persisted token");
        }
        self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Unauthenticated) {
                return false;
            }
            *state = SessionState::Unauthenticated;
            true
        });
    }

    /// Clears the session only while `token` is still the current one.
    ///
    /// Returns `false`, leaving both the durable slot and the state alone,
    /// when the session was replaced or cleared after `token` was issued.
    pub fn clear_if_token(&self, token: &str) -> bool {
        self.state.send_if_modified(|state| {
            if state.token() != Some(token) {
                return false;
            }
            match self.tokens.load() {
                Ok(Some(persisted)) if persisted != token => {
                    debug!("durable slot already holds a newer token");
                }
                _ => {
                    if let Err(error) = self.tokens.clear() {
                        warn!(%error, "failed to clear persisted token");
                    }
                }
            }
            *state = SessionState::Unauthenticated;
            true
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current bearer token.
    pub fn bearer(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    /// Current user, when authenticated.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    /// `true` iff both a token and a user are present.
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Authenticated(_))
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Applies `update` to the current user. Returns `false` when signed out.
    pub fn update_user(&self, update: impl FnOnce(&mut UserProfile)) -> bool {
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(session) => {
                update(&mut session.user);
                true
            }
            SessionState::Unauthenticated | SessionState::Restoring { .. } => false,
        })
    }

    /// Attaches a freshly fetched profile to the session that requested it.
    ///
    /// Ignored when the token changed while the profile was in flight.
    pub(crate) fn attach_user(&self, token: &str, user: UserProfile) -> bool {
        self.state.send_if_modified(|state| {
            if state.token() != Some(token) {
                return false;
            }
            *state = SessionState::Authenticated(Session {
                token: token.to_string(),
                user,
            });
            true
        })
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
