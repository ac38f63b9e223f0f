#![warn(missing_docs)]
//! # doclens-host
//!
//! ## Purpose
//! Adapts the client to its surrounding environment: an embedded Telegram
//! Mini-App host or a plain standalone shell.
//!
//! ## Responsibilities
//! - Detect a real embedded host from an environment snapshot.
//! - Define the [`HostBridge`] capability trait.
//! - Provide [`EmbeddedHost`] (forwards commands over a [`HostChannel`]) and
//!   [`StandaloneHost`] (skips haptics, renders alerts generically).
//! - Map workflow outcomes to tactile and modal feedback via [`announce`].
//!
//! ## Data flow
//! Startup reads [`HostEnvironment::from_env`] -> [`select_host`] picks one
//! bridge -> controllers call [`announce`] on every user-facing transition.
//!
//! ## Ownership and lifetimes
//! The chosen bridge is shared as `Arc<dyn HostBridge>` for the whole run.
//!
//! ## Error model
//! Bridge failures are [`HostError`] values that implementations log and
//! swallow: feedback is best-effort and never fails a workflow.
//!
//! ## Security and privacy notes
//! The raw init payload is signed host data; it is parsed for the user
//! record only and never logged.
//!
//! ## Example
//! ```rust
//! use doclens_host::{detect_embedded_host, HostEnvironment};
//!
//! assert!(!detect_embedded_host(&HostEnvironment::default()));
//! ```

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Env var carrying the host init payload.
pub const INIT_DATA_ENV: &str = "DOCLENS_HOST_INIT_DATA";
/// Env var carrying the host platform identifier.
pub const PLATFORM_ENV: &str = "DOCLENS_HOST_PLATFORM";
/// Env var carrying the host bridge version.
pub const VERSION_ENV: &str = "DOCLENS_HOST_VERSION";

/// Platform value the host reports when it cannot identify itself.
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// Marker injected by browser automation tools into fake init payloads.
pub const AUTOMATION_SIGNATURE: &str = "browser_automation";

/// Background/header color applied when embedded.
pub const DEFAULT_THEME_COLOR: &str = "#0f0f23";

const EVENT_CAPACITY: usize = 16;

/// Snapshot of the host globals at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Signed init payload (URL-encoded form).
    pub init_data: Option<String>,
    /// Platform identifier.
    pub platform: Option<String>,
    /// Bridge version.
    pub version: Option<String>,
}

impl HostEnvironment {
    /// Reads a fresh snapshot from the process environment.
    ///
    /// Never cached: every call reflects the environment at that moment.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|value| !value.is_empty());
        Self {
            init_data: read(INIT_DATA_ENV),
            platform: read(PLATFORM_ENV),
            version: read(VERSION_ENV),
        }
    }

    /// User record embedded in the init payload, if present and well formed.
    pub fn init_user(&self) -> Option<HostUser> {
        let init_data = self.init_data.as_deref()?;
        url::form_urlencoded::parse(init_data.as_bytes())
            .find(|(key, _)| key == "user")
            .and_then(|(_, raw)| serde_json::from_str(&raw).ok())
    }
}

/// Returns `true` only when all three embedded-host markers hold:
/// a non-empty init payload, a platform other than [`UNKNOWN_PLATFORM`], and
/// no automation signature.
pub fn detect_embedded_host(environment: &HostEnvironment) -> bool {
    let Some(init_data) = environment
        .init_data
        .as_deref()
        .filter(|data| !data.trim().is_empty())
    else {
        return false;
    };

    let known_platform = environment
        .platform
        .as_deref()
        .map(|platform| platform.trim().to_ascii_lowercase())
        .is_some_and(|platform| !platform.is_empty() && platform != UNKNOWN_PLATFORM);

    known_platform && !init_data.contains(AUTOMATION_SIGNATURE)
}

/// User as reported by the embedded host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUser {
    /// Host-side user id.
    pub id: i64,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Handle without `@`.
    #[serde(default)]
    pub username: Option<String>,
    /// IETF language tag of the host UI.
    #[serde(default)]
    pub language_code: Option<String>,
}

/// Tactile feedback categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticKind {
    /// Light impact.
    Light,
    /// Medium impact.
    Medium,
    /// Heavy impact.
    Heavy,
    /// Soft impact.
    Soft,
    /// Rigid impact.
    Rigid,
    /// Success notification.
    Success,
    /// Warning notification.
    Warning,
    /// Error notification.
    Error,
}

impl HapticKind {
    /// `true` for notification-style haptics, `false` for impacts.
    pub fn is_notification(self) -> bool {
        matches!(
            self,
            HapticKind::Success | HapticKind::Warning | HapticKind::Error
        )
    }
}

/// Header and background colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    /// Header color (hex or theme key).
    pub header: String,
    /// Background color.
    pub background: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            header: DEFAULT_THEME_COLOR.to_string(),
            background: DEFAULT_THEME_COLOR.to_string(),
        }
    }
}

/// Command sent to the embedded host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    /// Signal the app is ready.
    Ready,
    /// Expand to full height.
    Expand,
    /// Apply colors.
    SetTheme(ThemeColors),
    /// Impact feedback (`light`..`rigid`).
    ImpactOccurred {
        /// Impact style.
        style: HapticKind,
    },
    /// Notification feedback (`success`, `warning`, `error`).
    NotificationOccurred {
        /// Notification type.
        kind: HapticKind,
    },
    /// Native alert.
    ShowAlert {
        /// Alert text.
        message: String,
    },
    /// Close the host view.
    Close,
}

/// Notification pushed by the embedded host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// Viewport height or expansion changed.
    ViewportChanged {
        /// New stable height in pixels.
        height: u32,
        /// Whether the view is fully expanded.
        is_expanded: bool,
    },
    /// Host theme changed.
    ThemeChanged,
}

/// Wire to a concrete embedded host.
pub trait HostChannel: Send + Sync {
    /// Delivers one fire-and-forget command.
    fn post(&self, command: &HostCommand) -> Result<(), HostError>;

    /// Asks the host for a native yes/no dialog.
    fn confirm(&self, message: &str) -> Result<bool, HostError> {
        let _ = message;
        Err(HostError::Unsupported("confirm"))
    }
}

/// Channel writing one JSON document per command to a writer.
pub struct JsonLinesChannel<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesChannel<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> HostChannel for JsonLinesChannel<W> {
    fn post(&self, command: &HostCommand) -> Result<(), HostError> {
        let line = serde_json::to_string(command)
            .map_err(|error| HostError::Channel(error.to_string()))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| HostError::Channel("writer lock poisoned".to_string()))?;
        writeln!(writer, "{line}").map_err(|error| HostError::Channel(error.to_string()))?;
        writer
            .flush()
            .map_err(|error| HostError::Channel(error.to_string()))
    }
}

/// Capabilities the client may use from its environment.
pub trait HostBridge: Send + Sync {
    /// `true` when running inside a real embedded host.
    fn is_embedded(&self) -> bool;
    /// Expand the view to full height.
    fn expand(&self);
    /// Apply header/background colors.
    fn set_theme(&self, theme: &ThemeColors);
    /// User supplied by the host, if any.
    fn init_user(&self) -> Option<HostUser>;
    /// Trigger tactile feedback.
    fn haptic(&self, kind: HapticKind);
    /// Show a modal message.
    fn show_alert(&self, message: &str);
    /// Ask a yes/no question.
    fn show_confirm(&self, message: &str) -> bool;
    /// Close the host view.
    fn close(&self);
    /// Subscribe to viewport/theme notifications.
    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
}

/// Bridge to a real embedded host.
pub struct EmbeddedHost {
    channel: Arc<dyn HostChannel>,
    user: Option<HostUser>,
    events: broadcast::Sender<HostEvent>,
}

impl EmbeddedHost {
    /// Creates a bridge for `environment` speaking over `channel`.
    pub fn new(environment: &HostEnvironment, channel: Arc<dyn HostChannel>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            channel,
            user: environment.init_user(),
            events,
        }
    }

    /// Publishes a notification received from the host to subscribers.
    pub fn dispatch(&self, event: HostEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn post(&self, command: HostCommand) {
        if let Err(error) = self.channel.post(&command) {
            warn!(%error, "host command dropped");
        }
    }
}

impl HostBridge for EmbeddedHost {
    fn is_embedded(&self) -> bool {
        true
    }

    fn expand(&self) {
        self.post(HostCommand::Ready);
        self.post(HostCommand::Expand);
    }

    fn set_theme(&self, theme: &ThemeColors) {
        self.post(HostCommand::SetTheme(theme.clone()));
    }

    fn init_user(&self) -> Option<HostUser> {
        self.user.clone()
    }

    fn haptic(&self, kind: HapticKind) {
        let command = if kind.is_notification() {
            HostCommand::NotificationOccurred { kind }
        } else {
            HostCommand::ImpactOccurred { style: kind }
        };
        self.post(command);
    }

    fn show_alert(&self, message: &str) {
        self.post(HostCommand::ShowAlert {
            message: message.to_string(),
        });
    }

    fn show_confirm(&self, message: &str) -> bool {
        match self.channel.confirm(message) {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, "host confirm unavailable, treating as declined");
                false
            }
        }
    }

    fn close(&self) {
        self.post(HostCommand::Close);
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}

/// Fallback bridge used outside any embedded host.
pub struct StandaloneHost {
    alerts: Mutex<Box<dyn Write + Send>>,
    auto_confirm: bool,
    events: broadcast::Sender<HostEvent>,
}

impl StandaloneHost {
    /// Creates a bridge rendering alerts to `alerts`; confirmations resolve
    /// to `auto_confirm`.
    pub fn new(alerts: Box<dyn Write + Send>, auto_confirm: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            alerts: Mutex::new(alerts),
            auto_confirm,
            events,
        }
    }

    /// Bridge that writes alerts to stderr and declines confirmations.
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()), false)
    }
}

impl HostBridge for StandaloneHost {
    fn is_embedded(&self) -> bool {
        false
    }

    fn expand(&self) {}

    fn set_theme(&self, _theme: &ThemeColors) {}

    fn init_user(&self) -> Option<HostUser> {
        None
    }

    fn haptic(&self, kind: HapticKind) {
        trace!(?kind, "haptic skipped outside embedded host");
    }

    fn show_alert(&self, message: &str) {
        match self.alerts.lock() {
            Ok(mut writer) => {
                if let Err(error) = writeln!(writer, "{message}") {
                    warn!(%error, "alert could not be rendered");
                }
            }
            Err(_) => warn!("alert writer lock poisoned"),
        }
    }

    fn show_confirm(&self, message: &str) -> bool {
        debug!(answer = self.auto_confirm, "standalone confirm: {message}");
        self.auto_confirm
    }

    fn close(&self) {}

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}

/// Chooses the bridge once at startup.
pub fn select_host(
    environment: &HostEnvironment,
    channel: Arc<dyn HostChannel>,
) -> Arc<dyn HostBridge> {
    if detect_embedded_host(environment) {
        debug!(platform = ?environment.platform, "embedded host detected");
        Arc::new(EmbeddedHost::new(environment, channel))
    } else {
        debug!("no embedded host, using standalone bridge");
        Arc::new(StandaloneHost::stderr())
    }
}

/// Expands the view and applies the app theme when embedded.
pub fn setup_host(host: &dyn HostBridge) {
    if host.is_embedded() {
        host.expand();
        host.set_theme(&ThemeColors::default());
    }
}

/// User-facing workflow transitions that deserve feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Work started (file accepted, request sent).
    Started,
    /// State cleared by the user.
    Reset,
    /// Operation succeeded.
    Succeeded(String),
    /// Recoverable problem the user must fix (rejected file, missing key).
    Warning(String),
    /// Operation failed.
    Failed(String),
}

/// Emits the haptic for `feedback` and, on embedded hosts, a native alert.
///
/// Standalone shells render the message inline, so no alert is raised there.
pub fn announce(host: &dyn HostBridge, feedback: &Feedback) {
    let (kind, alert) = match feedback {
        Feedback::Started | Feedback::Reset => (HapticKind::Light, None),
        Feedback::Succeeded(message) => (HapticKind::Success, Some(message.clone())),
        Feedback::Warning(message) => (HapticKind::Warning, Some(message.clone())),
        Feedback::Failed(message) => (HapticKind::Error, Some(format!("Error: {message}"))),
    };

    host.haptic(kind);
    if let Some(alert) = alert
        && host.is_embedded()
    {
        host.show_alert(&alert);
    }
}

/// Host bridge errors.
#[derive(Debug, Error)]
pub enum HostError {
    /// Channel could not deliver a command.
    #[error("host channel failure: {0}")]
    Channel(String),
    /// Capability not offered by this channel.
    #[error("host capability unsupported: {0}")]
    Unsupported(&'static str),
}
