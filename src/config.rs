//! Configuration module for linechat.

use serde::Deserialize;
use std::path::Path;

use crate::{ChatError, Result};

/// Stream transport the chat listener binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// TCP socket on `host:port`.
    #[default]
    Tcp,
    /// Unix domain socket at `socket_path`.
    Unix,
}

impl TransportKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Unix => "unix",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Chat listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Transport kind.
    #[serde(default)]
    pub transport: TransportKind,
    /// Socket path for the unix transport.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Timezone for message timestamps (e.g., "Europe/Berlin", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3333
}

fn default_socket_path() -> String {
    "linechat.sock".to_string()
}

fn default_max_connections() -> usize {
    100
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportKind::default(),
            socket_path: default_socket_path(),
            max_connections: default_max_connections(),
            timezone: default_timezone(),
        }
    }
}

/// Chat transcript configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Path of the append-only transcript. Empty disables it.
    #[serde(default = "default_chat_log_file")]
    pub log_file: String,
}

fn default_chat_log_file() -> String {
    "logs/chat.log".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            log_file: default_chat_log_file(),
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Whether the HTTP surface is enabled.
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number for the HTTP surface.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_web_enabled() -> bool {
    true
}

fn default_web_port() -> u16 {
    3000
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            host: default_host(),
            port: default_web_port(),
            cors_origins: vec![],
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/linechat.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Chat listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat transcript configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// HTTP surface configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ChatError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LINECHAT_PORT`: Override the chat listener port
    /// - `LINECHAT_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("LINECHAT_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ChatError::Config(format!("LINECHAT_PORT is not a port: {port}")))?;
        }
        if let Ok(level) = std::env::var("LINECHAT_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `max_connections` is zero
    /// - the timezone is not a known IANA name
    /// - the unix transport is selected without a socket path
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(ChatError::Config(
                "server.max_connections must be at least 1".to_string(),
            ));
        }
        if self.server.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ChatError::Config(format!(
                "unknown timezone: {}",
                self.server.timezone
            )));
        }
        if self.server.transport == TransportKind::Unix && self.server.socket_path.is_empty() {
            return Err(ChatError::Config(
                "server.socket_path is required for the unix transport".to_string(),
            ));
        }
        Ok(())
    }
}
