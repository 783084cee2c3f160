//! Client configuration

use crate::{LiveConnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How much the client logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Nothing
    #[default]
    Silent,
    /// Warnings and errors
    Warn,
    /// Everything down to debug
    Debug,
}

impl LogMode {
    /// Default `tracing` filter directive for this mode
    pub fn directive(self) -> &'static str {
        match self {
            Self::Silent => "off",
            Self::Warn => "warn",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Silent => "silent",
            Self::Warn => "warn",
            Self::Debug => "debug",
        };
        f.write_str(name)
    }
}

impl FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "warn" => Ok(Self::Warn),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown log mode '{}', expected silent, warn or debug", other)),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server authority, `host[:port]`
    pub host: String,
    /// Use `wss`/`https` instead of `ws`/`http`
    pub secure: bool,
    /// Path of the WebSocket endpoint
    pub socket_path: String,
    /// Minimum milliseconds between two pointer events
    pub pointer_interval_ms: u64,
    /// Log verbosity
    pub log: LogMode,
    /// Bound every decoded payload to its declared frame size
    pub strict_frames: bool,
    /// Give up when authentication is not acknowledged in time
    pub auth_timeout_ms: Option<u64>,
    /// File remembering the user of each area; in memory when unset
    pub store_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost:8080".to_string(),
            secure: true,
            socket_path: "/ws".to_string(),
            pointer_interval_ms: 0,
            log: LogMode::default(),
            strict_frames: false,
            auth_timeout_ms: None,
            store_path: None,
        }
    }
}

impl ClientConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)
            .map_err(|e| LiveConnError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Parse a configuration from JSON text
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(LiveConnError::Config("host must not be empty".to_string()));
        }
        if self.host.contains("://") {
            return Err(LiveConnError::Config(format!(
                "host '{}' must not include a scheme",
                self.host
            )));
        }
        if !self.socket_path.starts_with('/') {
            return Err(LiveConnError::Config(format!(
                "socket path '{}' must start with '/'",
                self.socket_path
            )));
        }
        Ok(())
    }

    /// Set the server authority
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Choose between TLS and plain connections
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the minimum interval between pointer events
    pub fn with_pointer_interval(mut self, interval: Duration) -> Self {
        self.pointer_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the log verbosity
    pub fn with_log_mode(mut self, log: LogMode) -> Self {
        self.log = log;
        self
    }

    /// Enable or disable strict frame decoding
    pub fn with_strict_frames(mut self, strict: bool) -> Self {
        self.strict_frames = strict;
        self
    }

    /// Fail when authentication is not acknowledged within `timeout`
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Persist identities in `path`
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// WebSocket URL of the server
    pub fn socket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}{}", scheme, self.host, self.socket_path)
    }

    /// Base URL of the bootstrap HTTP endpoints
    pub fn http_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }

    /// Minimum interval between pointer events
    pub fn pointer_interval(&self) -> Duration {
        Duration::from_millis(self.pointer_interval_ms)
    }

    /// Authentication timeout, if any
    pub fn auth_timeout(&self) -> Option<Duration> {
        self.auth_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.socket_url(), "wss://localhost:8080/ws");
        assert_eq!(config.http_base(), "https://localhost:8080");
        assert_eq!(config.pointer_interval(), Duration::ZERO);
        assert_eq!(config.auth_timeout(), None);
        assert_eq!(config.log, LogMode::Silent);
        assert!(!config.strict_frames);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::default()
            .with_host("example.org")
            .with_secure(false)
            .with_pointer_interval(Duration::from_millis(40))
            .with_log_mode(LogMode::Debug)
            .with_strict_frames(true)
            .with_auth_timeout(Duration::from_secs(2))
            .with_store_path("/tmp/ids.json");

        assert_eq!(config.socket_url(), "ws://example.org/ws");
        assert_eq!(config.http_base(), "http://example.org");
        assert_eq!(config.pointer_interval_ms, 40);
        assert_eq!(config.auth_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/ids.json")));
        assert!(config.strict_frames);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{"host": "live.example", "log": "warn"}"#;
        let config = ClientConfig::from_json_str(json).unwrap();

        assert_eq!(config.host, "live.example");
        assert_eq!(config.log, LogMode::Warn);
        assert!(config.secure);
        assert_eq!(config.socket_path, "/ws");
    }

    #[test]
    fn test_invalid_json_values() {
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"host": ""}"#),
            Err(LiveConnError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"host": "https://x"}"#),
            Err(LiveConnError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"socket_path": "ws"}"#),
            Err(LiveConnError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"log": "loud"}"#),
            Err(LiveConnError::Serialization(_))
        ));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("liveconn.json");
        let config = ClientConfig::default()
            .with_host("10.0.0.2:9000")
            .with_auth_timeout(Duration::from_millis(1500));
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(ClientConfig::from_json_file(&path).unwrap(), config);
        assert!(matches!(
            ClientConfig::from_json_file(dir.path().join("missing.json")),
            Err(LiveConnError::Io(_))
        ));
    }

    #[test]
    fn test_log_mode_parsing() {
        assert_eq!("silent".parse::<LogMode>(), Ok(LogMode::Silent));
        assert_eq!("WARN".parse::<LogMode>(), Ok(LogMode::Warn));
        assert_eq!("debug".parse::<LogMode>(), Ok(LogMode::Debug));
        assert!("trace".parse::<LogMode>().is_err());

        assert_eq!(LogMode::Silent.directive(), "off");
        assert_eq!(LogMode::Warn.directive(), "warn");
        assert_eq!(LogMode::Debug.directive(), "debug");
        assert_eq!(LogMode::Debug.to_string(), "debug");
    }
}
