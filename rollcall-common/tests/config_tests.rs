//! Integration tests for bootstrap configuration resolution
//!
//! Tests cover:
//! - Missing TOML file falls back to defaults without failing
//! - Unparseable TOML is reported as a configuration error
//! - Environment variables override the TOML file
//! - write_toml_config / load_toml_config round trip through disk
//!
//! Tests that touch ROLLCALL_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use rollcall_common::config::{
    load_toml_config, write_toml_config, ConfigResolver, ConfigSource, LoggingConfig,
    StreamConfig, TomlConfig, ENV_CONFIG_PATH, ENV_PORT, ENV_SNAPSHOT_PATH,
};
use rollcall_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_PORT);
    env::remove_var(ENV_SNAPSHOT_PATH);
}

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let config = ConfigResolver::new()
        .with_path(Some(missing))
        .resolve()
        .expect("missing config must not be an error");

    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_malformed_config_file_is_error() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let result = ConfigResolver::new().with_path(Some(path)).resolve();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_config_path_from_env() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rollcall.toml");
    std::fs::write(&path, "port = 4242\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, &path);

    let config = ConfigResolver::new().resolve().unwrap();
    assert_eq!(config.port, 4242);

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_toml_values() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = 4242\nsnapshot_path = \"from-toml.json\"\n").unwrap();

    env::set_var(ENV_PORT, "5151");
    env::set_var(ENV_SNAPSHOT_PATH, "/tmp/from-env.json");

    let config = ConfigResolver::new().with_path(Some(path)).resolve().unwrap();
    assert_eq!(config.port, 5151);
    assert_eq!(config.snapshot_path, PathBuf::from("/tmp/from-env.json"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_port_env_is_error() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var(ENV_PORT, "eighty");

    let result = ConfigResolver::new()
        .with_path(Some(temp_dir.path().join("none.toml")))
        .resolve();
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
fn test_write_then_load_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let config = TomlConfig {
        bind_address: "0.0.0.0".to_string(),
        port: 1600,
        snapshot_path: PathBuf::from("/var/lib/rollcall/output.json"),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        stream: StreamConfig {
            probe_timeout_ms: 1000,
            read_idle_timeout_ms: 30_000,
        },
    };

    write_toml_config(&config, &path).unwrap();
    assert!(path.exists());

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn test_resolve_reports_source() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let (_, source) = ConfigResolver::new()
        .with_path(Some(path.clone()))
        .resolve_with_source()
        .unwrap();
    assert_eq!(source, ConfigSource::Defaults(Some(path.clone())));

    std::fs::write(&path, "bind_address = \"0.0.0.0\"\n").unwrap();
    let (config, source) = ConfigResolver::new()
        .with_path(Some(path.clone()))
        .resolve_with_source()
        .unwrap();
    assert_eq!(source, ConfigSource::File(path));
    assert_eq!(config.listen_address(), "0.0.0.0:1500");
}
