// ============================================
// File: crates/pearpass-host/src/config.rs
// ============================================
//! # Host Configuration
//!
//! TOML configuration for the channel host, with serde defaults so a
//! missing file or a partial file both work.
//!
//! ## Example Configuration
//! ```toml
//! [messaging]
//! enabled = true
//!
//! [logging]
//! level = "info"
//! ```
//!
//! The `messaging.enabled` flag is the user-facing switch the dispatcher
//! enforces: while it is off, every request except the pairing identity
//! read fails with `NativeMessagingDisabled`.
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// ============================================
// Errors
// ============================================

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================
// HostConfig
// ============================================

/// Host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Native-messaging settings.
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Native-messaging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Whether the user has enabled native messaging. Off by default;
    /// pairing the extension is the only thing that works without it.
    #[serde(default)]
    pub enabled: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HostConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading host configuration");

        let content = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads configuration, falling back to defaults when the file is
    /// missing or unreadable.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path).await {
            Ok(config) => config,
            Err(e) => {
                info!(error = %e, "Using default host configuration");
                Self::default()
            }
        }
    }
}

// ============================================
// Tests
// ============================================
