//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use messageu_client::config::{ClientConfig, LoggingConfig, ResolvePolicy, ServerConfig};
use messageu_client::error::Error;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = ClientConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.server.address, "127.0.0.1:1357");
    assert_eq!(config.server.resolve_policy, ResolvePolicy::Cached);
}

#[test]
fn test_invalid_server_address() {
    let mut config = ClientConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(!errors.is_empty(), "Should have validation errors");
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_host() {
    let config = ClientConfig::default_with_overrides(|c| c.server.address = ":1357".into());

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_and_garbage_ports() {
    for address in ["127.0.0.1:0", "127.0.0.1:http", "127.0.0.1:70000"] {
        let server = ServerConfig {
            address: address.into(),
            ..ServerConfig::default()
        };
        let errors = server.validate();
        assert!(
            errors.iter().any(|e| e.contains("Invalid server port")),
            "{address}: {errors:?}"
        );
    }
}

#[test]
fn test_host_names_are_accepted() {
    let server = ServerConfig {
        address: "chat.example.org:1357".into(),
        resolve_policy: ResolvePolicy::EveryConnection,
    };
    assert!(server.validate().is_empty());
}

#[test]
fn test_empty_identity_file() {
    let config = ClientConfig::default_with_overrides(|c| {
        c.storage.identity_file = "".into();
    });
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Identity file")));
}

#[test]
fn test_content_dir_is_a_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = ClientConfig::default_with_overrides(|c| {
        c.storage.content_dir = file.path().to_path_buf();
    });
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("is a file")));
}

#[test]
fn test_empty_app_name() {
    let logging = LoggingConfig {
        app_name: String::new(),
        ..LoggingConfig::default()
    };
    let errors = logging.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let logging = LoggingConfig {
        app_name: "a".repeat(65),
        ..LoggingConfig::default()
    };
    let errors = logging.validate();
    assert!(errors.iter().any(|e| e.contains("too long")));
}

#[test]
fn test_log_to_file_without_path() {
    let logging = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    let errors = logging.validate();
    assert!(errors.iter().any(|e| e.contains("log_file_path")));
}

#[test]
fn test_no_logging_outputs() {
    let logging = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..LoggingConfig::default()
    };
    let errors = logging.validate();
    assert!(errors.iter().any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    assert!(ClientConfig::default().validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let config = ClientConfig::default_with_overrides(|c| {
        c.server.address = "nope".into();
    });
    let err = config.validate_strict().unwrap_err();
    assert!(matches!(&err, Error::Config(msg) if msg.contains("Configuration validation failed")));
}

#[test]
fn test_toml_roundtrip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");
    let config = ClientConfig::default_with_overrides(|c| {
        c.server.address = "10.1.2.3:4000".into();
        c.server.resolve_policy = ResolvePolicy::EveryConnection;
        c.logging.log_level = Level::DEBUG;
        c.logging.json_format = true;
    });
    config.save_to_file(&path).unwrap();

    let loaded = ClientConfig::from_file(&path).unwrap();
    assert_eq!(loaded.server.address, "10.1.2.3:4000");
    assert_eq!(loaded.server.resolve_policy, ResolvePolicy::EveryConnection);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.logging.json_format);
}

#[test]
fn test_invalid_toml_and_log_level() {
    assert!(matches!(
        ClientConfig::from_toml("[server"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        ClientConfig::from_toml("[logging]\nlog_level = \"loud\"\napp_name = \"x\"\nlog_to_console = true\nlog_to_file = false\njson_format = false\n"),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ClientConfig::from_file(dir.path().join("absent.toml")),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        ClientConfig::from_server_info_file(dir.path().join("server.info")),
        Err(Error::Config(_))
    ));
}
