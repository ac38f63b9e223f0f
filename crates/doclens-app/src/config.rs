//! Runtime configuration loaded from the environment.
//!
//! A `.env` file in the working directory is honored for local development,
//! except in unit tests so they stay hermetic.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::{Host, Url};

/// Backend base URL (required).
pub const BACKEND_URL_ENV: &str = "DOCLENS_BACKEND_URL";
/// Directory holding the durable token slot.
pub const STATE_DIR_ENV: &str = "DOCLENS_STATE_DIR";
/// Analysis language hint sent with every upload.
pub const LANGUAGE_ENV: &str = "DOCLENS_LANGUAGE";
/// Per-request timeout in whole seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "DOCLENS_REQUEST_TIMEOUT_SECS";
/// Log filter directive.
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

const DEFAULT_STATE_DIR: &str = "./.doclens";
const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variable is unset or blank.
    #[error("missing the environment variable {0}")]
    MissingVar(&'static str),
    /// Variable is set to an unusable value.
    #[error("invalid value for the environment variable {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Everything the client needs at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Backend base URL.
    pub backend_url: Url,
    /// Directory for the durable token slot.
    pub state_dir: PathBuf,
    /// Optional analysis language override.
    pub language: Option<String>,
    /// Optional request timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// `tracing-subscriber` filter directive.
    pub log_filter: String,
}

impl AppConfig {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a missing backend URL or invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let raw_url = read(BACKEND_URL_ENV).ok_or(ConfigError::MissingVar(BACKEND_URL_ENV))?;
        let backend_url = validate_backend_url(&raw_url)?;

        let state_dir = read(STATE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

        let request_timeout = match read(REQUEST_TIMEOUT_ENV) {
            Some(raw) => {
                let seconds = raw.parse::<u64>().map_err(|_| {
                    ConfigError::InvalidValue(
                        REQUEST_TIMEOUT_ENV,
                        format!("'{raw}' is not a whole number of seconds"),
                    )
                })?;
                if seconds == 0 {
                    return Err(ConfigError::InvalidValue(
                        REQUEST_TIMEOUT_ENV,
                        "timeout must be positive".to_string(),
                    ));
                }
                Some(Duration::from_secs(seconds))
            }
            None => None,
        };

        Ok(Self {
            backend_url,
            state_dir,
            language: read(LANGUAGE_ENV),
            request_timeout,
            log_filter: read(LOG_FILTER_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

/// Parses and checks the backend base URL.
///
/// HTTPS is required, except plain HTTP to a loopback host for local
/// development.
///
/// # Errors
/// Returns [`ConfigError::InvalidValue`] for unparsable or insecure URLs.
pub fn validate_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|error| ConfigError::InvalidValue(BACKEND_URL_ENV, error.to_string()))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        scheme => Err(ConfigError::InvalidValue(
            BACKEND_URL_ENV,
            format!("scheme '{scheme}' is not allowed; use https"),
        )),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(address)) => address.is_loopback(),
        Some(Host::Ipv6(address)) => address.is_loopback(),
        None => false,
    }
}
