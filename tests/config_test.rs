use overstock::config::{AppConfig, ConfigManager};
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");

    // Backend defaults
    assert_eq!(config.backend.base_url, "http://localhost:5050");
    assert_eq!(config.backend.timeout_secs, 30);
    assert_eq!(config.backend.table_page_size, 50);
    assert_eq!(config.backend.results_page_size, 1000);

    // Auth is disabled until an API key is provided
    assert!(config.auth.api_key.is_none());

    // Display defaults match the web dashboard's banding
    assert_eq!(config.display.high_risk_threshold, 100.0);
    assert_eq!(config.display.warn_threshold, 50.0);

    assert_eq!(config.performance.event_poll_interval_ms, 25);
    assert_eq!(config.search.history_limit, 1000);
    assert!(config.search.enable_history);

    assert_eq!(config.theme.color_mode, "auto");
    assert_eq!(config.theme.colors.risk_high, "red");
    assert_eq!(config.theme.colors.controls_bg, "indexed(236)");

    assert!(!config.debug.enabled);
    assert!(config.stores.is_empty());
}

#[test]
fn test_generate_default_config_template() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config();
    assert!(template.contains("[backend]"));
    assert!(template.contains("[auth]"));
    assert!(template.contains("[display]"));
    assert!(template.contains("[performance]"));
    assert!(template.contains("[search]"));
    assert!(template.contains("[theme.colors]"));

    // The template must parse back to the built-in defaults
    let parsed: AppConfig = toml::from_str(&template).expect("template should parse");
    assert_eq!(parsed.backend.base_url, AppConfig::default().backend.base_url);
    assert_eq!(
        parsed.display.high_risk_threshold,
        AppConfig::default().display.high_risk_threshold
    );
    parsed.validate().expect("template should validate");
}

#[test]
fn test_write_default_config_refuses_overwrite() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());

    // Second write without force fails
    assert!(config_manager.write_default_config(false).is_err());
    // With force it succeeds
    assert!(config_manager.write_default_config(true).is_ok());
}

#[test]
fn test_load_from_partial_file_merges_over_defaults() {
    let (temp_dir, _config_manager) = setup_test_config_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[backend]
base_url = "http://warehouse.internal:5050"

[display]
warn_threshold = 25.0

[[stores]]
store_id = "CA_3"
name = "Sacramento"
lat = 38.58
lng = -121.49
"#,
    )
    .unwrap();

    let user = AppConfig::load_from(&config_path).unwrap();
    let mut config = AppConfig::default();
    config.merge(user);

    assert_eq!(config.backend.base_url, "http://warehouse.internal:5050");
    assert_eq!(config.display.warn_threshold, 25.0);
    // Unspecified values keep their defaults
    assert_eq!(config.backend.table_page_size, 50);
    assert_eq!(config.display.high_risk_threshold, 100.0);
    assert_eq!(config.stores.len(), 1);
    assert_eq!(config.stores[0].store_id, "CA_3");
}

#[test]
fn test_load_from_missing_file_is_default() {
    let (temp_dir, _config_manager) = setup_test_config_dir();
    let config = AppConfig::load_from(&temp_dir.path().join("nope.toml")).unwrap();
    assert_eq!(config.backend.base_url, AppConfig::default().backend.base_url);
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = AppConfig::default();
    config.backend.table_page_size = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.display.warn_threshold = 200.0; // above high_risk_threshold
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.theme.color_mode = "neon".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.theme.colors.risk_high = "not-a-color".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.backend.base_url = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let (temp_dir, _config_manager) = setup_test_config_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[backend\nbase_url = ").unwrap();
    assert!(AppConfig::load_from(&config_path).is_err());
}

#[test]
fn test_auth_merge_keeps_api_key() {
    let mut config = AppConfig::default();
    let mut user = AppConfig::default();
    user.auth.api_key = Some("AIza-test".to_string());
    config.merge(user);
    assert_eq!(config.auth.api_key.as_deref(), Some("AIza-test"));

    // Merging a config without a key does not erase an existing one
    config.merge(AppConfig::default());
    assert_eq!(config.auth.api_key.as_deref(), Some("AIza-test"));
}
