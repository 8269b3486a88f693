//! Client configuration
//!
//! Loaded with the following priority (highest to lowest):
//!
//! 1. Environment variables
//! 2. `~/.agent-link/settings.json`
//! 3. Defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::PermissionMode;

/// Settings directory under the user's home
const SETTINGS_DIR: &str = ".agent-link";
const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_CLIENT_NAME: &str = "agent-link";
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server address, e.g. `ws://127.0.0.1:8765`
    /// Environment variable: `AGENT_LINK_URL`
    pub server_url: Option<String>,

    /// Name sent in the `initialize` handshake
    /// Environment variable: `AGENT_LINK_CLIENT_NAME`
    pub client_name: String,

    /// Version sent in the `initialize` handshake
    pub client_version: String,

    /// Deadline for ordinary calls
    /// Environment variable: `AGENT_LINK_CALL_TIMEOUT_MS`
    pub call_timeout: Duration,

    /// Deadline for the `initialize` call
    /// Environment variable: `AGENT_LINK_HANDSHAKE_TIMEOUT_MS`
    pub handshake_timeout: Duration,

    /// Deadline for opening the transport
    /// Environment variable: `AGENT_LINK_CONNECT_TIMEOUT_MS`
    pub connect_timeout: Duration,

    /// Permission mode for new sessions
    /// Environment variable: `AGENT_LINK_PERMISSION_MODE`
    pub default_permission_mode: PermissionMode,

    /// Model passed with `turn/start`
    /// Environment variable: `AGENT_LINK_MODEL`
    pub model: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            default_permission_mode: PermissionMode::Default,
            model: None,
        }
    }
}

/// On-disk settings, all fields optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    #[serde(default)]
    pub handshake_timeout_ms: Option<u64>,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ClientSettings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Load settings from a file
    ///
    /// A missing file yields empty settings. A malformed file is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read settings file");
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => {
                tracing::debug!(path = %path.display(), "Loaded settings file");
                settings
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed settings file");
                Self::default()
            }
        }
    }

    /// Overlay environment variables on top of these settings
    fn merge_env(&mut self) {
        if let Some(url) = env_string("AGENT_LINK_URL") {
            self.server_url = Some(url);
        }
        if let Some(name) = env_string("AGENT_LINK_CLIENT_NAME") {
            self.client_name = Some(name);
        }
        if let Some(ms) = env_millis("AGENT_LINK_CALL_TIMEOUT_MS") {
            self.call_timeout_ms = Some(ms);
        }
        if let Some(ms) = env_millis("AGENT_LINK_HANDSHAKE_TIMEOUT_MS") {
            self.handshake_timeout_ms = Some(ms);
        }
        if let Some(ms) = env_millis("AGENT_LINK_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = Some(ms);
        }
        if let Some(mode) = env_string("AGENT_LINK_PERMISSION_MODE") {
            match PermissionMode::parse(&mode) {
                Some(mode) => self.permission_mode = Some(mode),
                None => tracing::warn!(value = %mode, "Ignoring unknown AGENT_LINK_PERMISSION_MODE"),
            }
        }
        if let Some(model) = env_string("AGENT_LINK_MODEL") {
            self.model = Some(model);
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_millis(key: &str) -> Option<u64> {
    let raw = env_string(key)?;
    match raw.parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring non-numeric timeout");
            None
        }
    }
}

impl ClientConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default settings file and the environment
    pub fn load() -> Self {
        let settings = ClientSettings::default_path()
            .map(|path| ClientSettings::load_from(&path))
            .unwrap_or_default();
        Self::from_settings_and_env(settings)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        Self::from_settings_and_env(ClientSettings::default())
    }

    /// Apply environment variables over `settings`, then defaults
    pub fn from_settings_and_env(mut settings: ClientSettings) -> Self {
        settings.merge_env();
        Self::from_settings(settings)
    }

    /// Build configuration from settings, falling back to defaults
    pub fn from_settings(settings: ClientSettings) -> Self {
        let defaults = Self::default();
        Self {
            server_url: settings.server_url,
            client_name: settings.client_name.unwrap_or(defaults.client_name),
            client_version: defaults.client_version,
            call_timeout: settings
                .call_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
            handshake_timeout: settings
                .handshake_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.handshake_timeout),
            connect_timeout: settings
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            default_permission_mode: settings
                .permission_mode
                .unwrap_or(defaults.default_permission_mode),
            model: settings.model,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}
