//! Application configuration loading from config.toml
//!
//! Every section and field has a default, so a missing or partial file still yields a
//! usable configuration. Database URLs can additionally be overridden through the
//! environment, see [`crate::config::database`].

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend database settings
    pub backend: BackendSettings,
    /// Local cache settings
    pub cache: CacheSettings,
    /// Authentication settings
    pub auth: AuthSettings,
    /// Push notification settings
    pub notifications: NotificationSettings,
}

/// `[backend]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// `SeaORM` connection URL; `DATABASE_URL` wins when set
    pub database_url: Option<String>,
}

/// `[cache]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `SeaORM` connection URL of the local store; `CACHE_DATABASE_URL` wins when set
    pub database_url: Option<String>,
    /// Connectivity assumed at start-up
    pub start_online: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            start_online: true,
        }
    }
}

/// `[auth]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// New password accounts must confirm their email before signing in
    pub require_email_confirmation: bool,
    /// Failed sign-ins tolerated per email inside `lockout_window_secs`
    pub max_failed_attempts: usize,
    /// Length of the failed sign-in window
    pub lockout_window_secs: u64,
    /// Lifetime of an issued session
    pub session_ttl_days: i64,
    /// OAuth authorize endpoint of the hosted auth service
    pub oauth_authorize_url: String,
    /// Custom URL scheme the mobile client registers for the OAuth callback
    pub redirect_scheme: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            require_email_confirmation: false,
            max_failed_attempts: 5,
            lockout_window_secs: 300,
            session_ttl_days: 30,
            oauth_authorize_url: "http://localhost:54321/auth/v1/authorize".to_string(),
            redirect_scheme: "myapp".to_string(),
        }
    }
}

impl AuthSettings {
    /// Lockout window as a [`Duration`].
    #[must_use]
    pub const fn lockout_window(&self) -> Duration {
        Duration::from_secs(self.lockout_window_secs)
    }
}

/// `[notifications]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Send push notifications for new transactions
    pub enabled: bool,
    /// Expo push API endpoint
    pub push_endpoint: String,
    /// Request timeout for the push endpoint
    pub timeout_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            push_endpoint: "https://exp.host/--/api/v2/push/send".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from the default location (./config.toml).
///
/// A missing file is not an error: defaults are used and a message is logged.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No config.toml found, using default configuration");
        Ok(AppConfig::default())
    }
}
