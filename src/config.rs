//! # Configuration Management
//!
//! Centralized configuration for the MessageU client.
//!
//! ## Configuration Sources
//! - TOML files via [`ClientConfig::from_file`]
//! - Environment variables via [`ClientConfig::from_env`]
//! - The legacy single-line `server.info` file (`<ip>:<port>`) via
//!   [`ClientConfig::from_server_info_file`]
//! - Direct instantiation with defaults
//!
//! ```toml
//! [server]
//! address = "127.0.0.1:1357"
//! resolve_policy = "cached"
//!
//! [storage]
//! identity_file = "my.info"
//! content_dir = "/tmp/MessageU"
//!
//! [logging]
//! log_level = "debug"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Default server port used by the reference server.
pub const DEFAULT_PORT: u16 = 1357;

/// Default name of the identity file.
pub const DEFAULT_IDENTITY_FILE: &str = "my.info";

/// Name of the sub-folder of the system temp dir used for message content.
pub const CONTENT_FOLDER_NAME: &str = "MessageU";

/// Main client configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `MESSAGEU_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MESSAGEU_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(path) = std::env::var("MESSAGEU_IDENTITY_FILE") {
            config.storage.identity_file = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("MESSAGEU_CONTENT_DIR") {
            config.storage.content_dir = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("MESSAGEU_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| Error::Config(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Defaults with the server address read from a legacy `server.info` file
    pub fn from_server_info_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read the server info from {}: {e}",
                path.display()
            ))
        })?;
        let line = contents.lines().next().unwrap_or_default();
        let address = parse_server_info(line).ok_or_else(|| {
            Error::Config(format!(
                "could not read the server info from {}",
                path.display()
            ))
        })?;

        let mut config = Self::default();
        config.server.address = address;
        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Parse `<ipv4>:<port>`, tolerating surrounding whitespace.
fn parse_server_info(line: &str) -> Option<String> {
    let (ip, port) = line.trim().rsplit_once(':')?;

    let octets: Vec<&str> = ip.split('.').collect();
    let valid_ip = octets.len() == 4
        && octets
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.chars().all(|c| c.is_ascii_digit()));
    let valid_port = (1..=5).contains(&port.len()) && port.parse::<u16>().is_ok();

    (valid_ip && valid_port).then(|| format!("{ip}:{port}"))
}

/// When the server address is resolved to socket addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePolicy {
    /// Resolve on first use and reuse the result until a connection attempt fails.
    #[default]
    Cached,
    /// Resolve before every connection.
    EveryConnection,
}

/// Server connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server address as `host:port`
    pub address: String,

    #[serde(default)]
    pub resolve_policy: ResolvePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            resolve_policy: ResolvePolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.address.rsplit_once(':') {
            None => errors.push(format!(
                "Invalid server address format: '{}' (expected format: 'host:port')",
                self.address
            )),
            Some((host, port)) => {
                if host.is_empty() {
                    errors.push("Server host cannot be empty".to_string());
                }
                if port.parse::<u16>().map(|p| p == 0).unwrap_or(true) {
                    errors.push(format!("Invalid server port: '{port}'"));
                }
            }
        }

        errors
    }
}

/// Where identity and message content live on disk
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub identity_file: PathBuf,

    /// Directory for temporary message content
    pub content_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            identity_file: PathBuf::from(DEFAULT_IDENTITY_FILE),
            content_dir: std::env::temp_dir().join(CONTENT_FOLDER_NAME),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.identity_file.as_os_str().is_empty() {
            errors.push("Identity file path cannot be empty".to_string());
        }
        if self.content_dir.as_os_str().is_empty() {
            errors.push("Content directory cannot be empty".to_string());
        } else if self.content_dir.is_file() {
            errors.push(format!(
                "Content directory is a file: {}",
                self.content_dir.display()
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("messageu-client"),
            log_level: Level::WARN,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_parse_server_info() {
        assert_eq!(
            parse_server_info("  127.0.0.1:1357 "),
            Some("127.0.0.1:1357".to_string())
        );
        assert_eq!(parse_server_info("localhost:1357"), None);
        assert_eq!(parse_server_info("127.0.0.1"), None);
        assert_eq!(parse_server_info("127.0.0.1:99999"), None);
        assert_eq!(parse_server_info("1.2.3.4.5:80"), None);
    }

    #[test]
    fn test_server_info_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.info");
        fs::write(&path, "10.0.0.7:8080\n").unwrap();
        let config = ClientConfig::from_server_info_file(&path).unwrap();
        assert_eq!(config.server.address, "10.0.0.7:8080");

        fs::write(&path, "garbage\n").unwrap();
        assert!(matches!(
            ClientConfig::from_server_info_file(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_toml_sections_default_independently() {
        let config = ClientConfig::from_toml(
            r#"
            [server]
            address = "chat.example:4000"
            resolve_policy = "every_connection"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.resolve_policy, ResolvePolicy::EveryConnection);
        assert_eq!(
            config.storage.identity_file,
            PathBuf::from(DEFAULT_IDENTITY_FILE)
        );
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_example_config_parses_back() {
        let text = ClientConfig::example_config();
        let config = ClientConfig::from_toml(&text).unwrap();
        assert_eq!(config.logging.log_level, Level::WARN);
    }

    #[test]
    fn test_validation_reports_problems() {
        let config = ClientConfig::default_with_overrides(|c| {
            c.server.address = "no-port".into();
            c.logging.log_to_console = false;
        });
        let errors = config.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(config.validate_strict().is_err());
    }
}
