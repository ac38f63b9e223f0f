#![warn(missing_docs)]
//! # doclens-app
//!
//! ## Purpose
//! Wires configuration, transport, session, host bridge, and controllers into
//! the `doclens` client, and drives them from command-line commands.
//!
//! ## Responsibilities
//! - Load [`AppConfig`] and initialize `tracing` once.
//! - Bootstrap in a fixed order: host bridge first, then session restore,
//!   then the controllers sharing one [`AuthClient`].
//! - Parse and execute CLI [`Command`]s, rendering user-visible text.
//! - Check backend URLs and redact free-form error text before logging it.
//!
//! ## Data flow
//! Env/config -> [`HttpTransport`] + [`FileTokenStore`] -> [`App::bootstrap`]
//! -> [`App::run`] -> controller snapshots -> `doclens-ui` projection -> text.
//!
//! ## Ownership and lifetimes
//! [`App`] owns every long-lived component; the session store is shared by
//! `Arc` so the auth client, upload controller, and history view observe the
//! same session.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]; its `Display` is the text
//! shown to the user before exiting with status 1.
//!
//! ## Security and privacy notes
//! - Backend URLs must be HTTPS (plain HTTP only to loopback).
//! - Tokens and keys never reach logs; [`redact_sensitive`] strips them from
//!   free-form strings.

use std::path::PathBuf;
use std::sync::Arc;

use doclens_analysis_contract::AnalysisFailure;
use doclens_auth::{
    ApiKeyUpdate, AuthClient, AuthError, FileTokenStore, ProfileUpdate, ProviderCredential,
    SessionStore, TokenStore,
};
use doclens_core::{BackendTransport, UploadFile, ValidationError};
use doclens_host::{
    HostBridge, HostChannel, HostEnvironment, JsonLinesChannel, select_host, setup_host,
};
use doclens_ui::{ResultView, UiAuthState, UiState, history_line, project_result, urgency_label};
use doclens_upload::{
    AnalysisRequestState, HistoryController, SelectionOutcome, UploadController, rejection_message,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod http;

pub use config::{AppConfig, ConfigError, validate_backend_url};
pub use http::HttpTransport;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("DOCLENS_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

const SECRET_MARKERS: [&str; 7] = [
    "password",
    "token",
    "authorization",
    "bearer",
    "api_key",
    "apikey",
    "credential",
];

/// Redacts common secret markers in log-safe output.
///
/// Everything from the first marker onward is replaced.
pub fn redact_sensitive(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let first = SECRET_MARKERS
        .iter()
        .filter_map(|marker| lower.find(marker).map(|position| (position, *marker)))
        .min_by_key(|(position, _)| *position);

    match first {
        Some((position, marker)) => format!("{}{marker}=<redacted>", &input[..position]),
        None => input.to_string(),
    }
}

/// Installs the global `tracing` subscriber writing to stderr.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// One CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show version, host, and session status.
    Status,
    /// Exchange an identity-provider credential for a session.
    Login {
        /// Google ID token.
        credential: String,
    },
    /// Drop the session.
    Logout,
    /// Show, or update, the profile.
    Profile {
        /// New display name.
        name: Option<String>,
        /// New preferred analysis language.
        language: Option<String>,
    },
    /// Analyse one document.
    Analyze {
        /// File to upload.
        path: PathBuf,
        /// Language override for this run.
        language: Option<String>,
    },
    /// List past analyses.
    History,
    /// Store an analysis-provider key.
    SetKey {
        /// The key.
        api_key: String,
        /// `gemini` (default), `openai`, or `anthropic`.
        provider: KeyProvider,
    },
    /// Ask the backend to provision a Gemini key.
    GenerateKey,
}

/// Analysis providers accepting user keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProvider {
    /// Google Gemini.
    Gemini,
    /// OpenAI.
    OpenAi,
    /// Anthropic.
    Anthropic,
}

impl KeyProvider {
    fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(AppError::Usage(format!("unknown provider '{other}'"))),
        }
    }
}

/// Usage text printed for `help` and argument errors.
pub const USAGE: &str = "usage: doclens <command>

commands:
  status                                   show session and host status
  login <credential>                       sign in with a Google ID token
  logout                                   sign out
  profile [--name <name>] [--language <code>]
  analyze <path> [--language <code>]       analyse a PDF, image, or text file
  history                                  list past analyses
  set-key <api-key> [--provider <gemini|openai|anthropic>]
  generate-key                             provision a Gemini key";

impl Command {
    /// Parses arguments following the program name.
    ///
    /// # Errors
    /// Returns [`AppError::Usage`] for unknown commands or missing operands.
    pub fn parse<I, S>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::<String>::into);
        let command = args.next().ok_or_else(|| AppError::Usage(USAGE.to_string()))?;

        let mut positional = Vec::new();
        let mut options = Vec::new();
        while let Some(arg) = args.next() {
            if let Some(flag) = arg.strip_prefix("--") {
                let value = args
                    .next()
                    .ok_or_else(|| AppError::Usage(format!("--{flag} needs a value")))?;
                options.push((flag.to_string(), value));
            } else {
                positional.push(arg);
            }
        }
        let option = |name: &str| {
            options
                .iter()
                .find(|(flag, _)| flag == name)
                .map(|(_, value)| value.clone())
        };
        let mut positional = positional.into_iter();
        let mut operand = |what: &str| {
            positional
                .next()
                .ok_or_else(|| AppError::Usage(format!("{command} needs <{what}>")))
        };

        match command.as_str() {
            "status" => Ok(Self::Status),
            "login" => Ok(Self::Login {
                credential: operand("credential")?,
            }),
            "logout" => Ok(Self::Logout),
            "profile" => Ok(Self::Profile {
                name: option("name"),
                language: option("language"),
            }),
            "analyze" => Ok(Self::Analyze {
                path: PathBuf::from(operand("path")?),
                language: option("language"),
            }),
            "history" => Ok(Self::History),
            "set-key" => Ok(Self::SetKey {
                api_key: operand("api-key")?,
                provider: match option("provider") {
                    Some(raw) => KeyProvider::parse(&raw)?,
                    None => KeyProvider::Gemini,
                },
            }),
            "generate-key" => Ok(Self::GenerateKey),
            _ => Err(AppError::Usage(USAGE.to_string())),
        }
    }

    /// Language override carried by `analyze`.
    pub fn language_override(&self) -> Option<&str> {
        match self {
            Self::Analyze { language, .. } => language.as_deref(),
            _ => None,
        }
    }
}

/// Fully wired client.
pub struct App {
    host: Arc<dyn HostBridge>,
    session: Arc<SessionStore>,
    auth: AuthClient,
    uploads: UploadController,
    history: HistoryController,
}

impl App {
    /// Builds the production client from `config`.
    ///
    /// Host commands are written as JSON lines to stdout when an embedded
    /// host is detected.
    ///
    /// # Errors
    /// Returns [`AppError::Http`] when the HTTP client cannot be built.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let transport = HttpTransport::new(config.backend_url.clone(), config.request_timeout)
            .map_err(|error| AppError::Http(error.to_string()))?;
        let channel: Arc<dyn HostChannel> = Arc::new(JsonLinesChannel::new(std::io::stdout()));
        let host = select_host(&HostEnvironment::from_env(), channel);
        let tokens = Arc::new(FileTokenStore::new(&config.state_dir));

        Ok(Self::bootstrap(Arc::new(transport), host, tokens, config.language.clone()).await)
    }

    /// Wires components in startup order and restores any durable session.
    ///
    /// A restored token whose profile fetch answers 401 is cleared; other
    /// profile failures keep the token for a later retry.
    pub async fn bootstrap(
        transport: Arc<dyn BackendTransport>,
        host: Arc<dyn HostBridge>,
        tokens: Arc<dyn TokenStore>,
        language: Option<String>,
    ) -> Self {
        setup_host(host.as_ref());

        let session = Arc::new(SessionStore::new(tokens));
        let auth = AuthClient::new(transport, Arc::clone(&session));
        if session.restore() {
            match auth.refresh_profile().await {
                Ok(user) => info!(user_id = %user.id, "session restored"),
                Err(AuthError::Unauthorized) => info!("stored session expired"),
                Err(error) => {
                    let error = redact_sensitive(&error.to_string());
                    warn!(%error, "profile refresh failed");
                }
            }
        }

        let uploads = UploadController::new(auth.clone(), Arc::clone(&host), language);
        let history = HistoryController::new(auth.clone());
        Self {
            host,
            session,
            auth,
            uploads,
            history,
        }
    }

    /// Shared session store.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Upload controller.
    pub fn uploads(&self) -> &UploadController {
        &self.uploads
    }

    /// Current view state.
    pub fn ui_state(&self) -> UiState {
        let mut state = UiState::new(format!("v{}", app_version()), self.host.is_embedded());
        state.apply_session(&self.session.state());
        state.apply_upload(&self.uploads.snapshot());
        state.apply_history(&self.history.entries());
        state
    }

    /// Executes one command and returns the text to print.
    ///
    /// # Errors
    /// Returns [`AppError`] whose message is the user-visible failure.
    pub async fn run(&self, command: Command) -> Result<String, AppError> {
        match command {
            Command::Status => Ok(self.render_status()),
            Command::Login { credential } => {
                let session = self
                    .auth
                    .login(&ProviderCredential::google(credential))
                    .await?;
                Ok(format!("Signed in as {}", session.user.name))
            }
            Command::Logout => {
                self.auth.logout();
                Ok("Signed out".to_string())
            }
            Command::Profile { name, language } => {
                let user = if name.is_none() && language.is_none() {
                    self.auth.refresh_profile().await?
                } else {
                    let update = ProfileUpdate {
                        name,
                        preferred_language: language,
                    };
                    self.auth.update_profile(&update).await?
                };
                Ok(format!(
                    "{} <{}>\nlanguage: {}\nanalysis key: {}",
                    user.name,
                    user.email,
                    user.preferred_language.as_deref().unwrap_or("-"),
                    if user.has_analysis_credential() { "configured" } else { "missing" },
                ))
            }
            Command::Analyze { path, .. } => self.analyze(path).await,
            Command::History => {
                let entries = self.history.load().await.map_err(AppError::Analysis)?;
                if entries.is_empty() {
                    return Ok("No analyses yet".to_string());
                }
                Ok(entries.iter().map(history_line).collect::<Vec<_>>().join("\n"))
            }
            Command::SetKey { api_key, provider } => match provider {
                KeyProvider::Gemini => {
                    let outcome = self.auth.quick_credential_setup(&api_key).await?;
                    Ok(outcome.message)
                }
                KeyProvider::OpenAi | KeyProvider::Anthropic => {
                    let mut keys = ApiKeyUpdate::default();
                    if provider == KeyProvider::OpenAi {
                        keys.api_key_2 = Some(api_key);
                    } else {
                        keys.api_key_3 = Some(api_key);
                    }
                    Ok(self.auth.save_api_keys(&keys).await?)
                }
            },
            Command::GenerateKey => {
                let outcome = self.auth.auto_generate_credential().await?;
                match outcome.api_key_masked {
                    Some(masked) => Ok(format!("{} ({masked})", outcome.message)),
                    None => Ok(outcome.message),
                }
            }
        }
    }

    async fn analyze(&self, path: PathBuf) -> Result<String, AppError> {
        let file = UploadFile::from_path(&path)?;
        match self.uploads.select_file(file).await {
            SelectionOutcome::Completed(AnalysisRequestState::Succeeded(result)) => {
                Ok(render_result(&project_result(&result)))
            }
            SelectionOutcome::Completed(AnalysisRequestState::Failed(message)) => {
                Err(AppError::Failed(message))
            }
            SelectionOutcome::Completed(state) => {
                Err(AppError::Failed(format!("unexpected analysis state: {state:?}")))
            }
            SelectionOutcome::Rejected(error) => Err(AppError::Rejected(error)),
            SelectionOutcome::Busy => Err(AppError::Failed(
                "an analysis is already in progress".to_string(),
            )),
        }
    }

    fn render_status(&self) -> String {
        let state = self.ui_state();
        let session = match (state.auth, &state.user_name) {
            (UiAuthState::SignedIn, Some(name)) => format!("signed in as {name}"),
            (UiAuthState::Restoring, _) => "restored, profile unavailable".to_string(),
            _ => "signed out".to_string(),
        };
        format!(
            "doclens {}\nhost: {}\nsession: {session}\nanalysis key: {}\nuploads: {}",
            state.version,
            if state.embedded { "embedded" } else { "standalone" },
            if state.has_credential { "configured" } else { "missing" },
            if state.can_upload() { "open" } else { "closed" },
        )
    }
}

fn render_result(view: &ResultView) -> String {
    let mut lines = vec![format!("{} [{}]", view.file_name, urgency_label(view.urgency))];
    if !view.summary.is_empty() {
        lines.push(view.summary.clone());
    }
    for section in &view.sections {
        lines.push(String::new());
        lines.push(format!("## {}", section.title));
        lines.push(section.body.clone());
    }
    if !view.actions_needed.is_empty() {
        lines.push(String::new());
        lines.push("## Actions".to_string());
        lines.extend(view.actions_needed.iter().map(|action| format!("- {action}")));
    }
    if let Some(template) = &view.response_template {
        lines.push(String::new());
        lines.push("## Suggested reply".to_string());
        lines.push(template.clone());
    }
    lines.join("\n")
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad command line.
    #[error("{0}")]
    Usage(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(String),
    /// Session or account error.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Local file could not be read.
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    /// File refused before upload.
    #[error("{}", rejection_message(.0))]
    Rejected(ValidationError),
    /// Analysis or history call failed.
    #[error("{}", .0.message())]
    Analysis(AnalysisFailure),
    /// Analysis ended in a failure state.
    #[error("{0}")]
    Failed(String),
}
