/// Database connection and table creation for the backend and local stores
pub mod database;

/// Application settings loaded from config.toml
pub mod settings;

pub use settings::{AppConfig, AuthSettings, NotificationSettings, load_config, load_default_config};
