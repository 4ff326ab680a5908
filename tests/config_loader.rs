use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use teamhub::config::{Config, ConfigError, PersistenceConfig};
use tempfile::TempDir;

/// Test that Config::default() produces the documented values.
#[test]
fn test_config_default_values() {
    let config = Config::default();
    assert_eq!(config.persistence.debounce_ms, 300);
    assert!(config.persistence.directory.is_none());
    assert_eq!(config.logging.filter, "info");
    assert_eq!(config.mirror_options().debounce, Duration::from_millis(300));
}

/// Test that Config::config_path() returns a path ending with the expected filename.
#[test]
fn test_config_path_ends_with_expected() {
    let path = Config::config_path();
    assert!(path.ends_with("teamhub/config.toml"));
}

/// A missing file is not an error.
#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

/// Partial files fill the rest from defaults.
#[test]
fn test_partial_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[persistence]
directory = "/var/lib/teamhub"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(
        config.persistence.directory,
        Some(PathBuf::from("/var/lib/teamhub"))
    );
    assert_eq!(config.persistence.debounce_ms, 300);
    assert_eq!(config.logging.filter, "info");
    assert_eq!(config.storage().dir(), PathBuf::from("/var/lib/teamhub"));
}

#[test]
fn test_full_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[persistence]
debounce_ms = 50

[logging]
filter = "teamhub=trace"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.persistence.debounce_ms, 50);
    assert_eq!(config.logging.filter, "teamhub=trace");
}

#[test]
fn test_zero_debounce_fails_validation() {
    let config = Config {
        persistence: PersistenceConfig {
            directory: None,
            debounce_ms: 0,
        },
        ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
    assert!(err.to_string().contains("debounce_ms"));
}

#[test]
fn test_empty_directory_fails_validation() {
    let config = Config {
        persistence: PersistenceConfig {
            directory: Some(PathBuf::new()),
            debounce_ms: 300,
        },
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[persistence\ndebounce_ms = ").unwrap();
    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::ParseError { .. })
    ));
}

#[test]
fn test_wrong_type_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[persistence]\ndebounce_ms = \"fast\"\n").unwrap();
    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::ParseError { .. })
    ));
}
