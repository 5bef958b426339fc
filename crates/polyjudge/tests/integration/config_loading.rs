use polyjudge::config::{Config, Engine};

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{}/configs/valid_full.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.sandbox.timeout_ms, 3000);
    assert_eq!(config.sandbox.node_args, vec!["--no-warnings"]);
    assert_eq!(config.bundler.cdn_base, "https://cdn.example.com");
    assert_eq!(config.remote.request_timeout_secs, Some(20));
    assert_eq!(config.languages["js"].engine, Engine::Sandbox);
    assert_eq!(config.languages["py"].engine, Engine::Remote);
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{}/configs/valid_minimal.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("rb"));
    assert_eq!(config.sandbox.timeout_ms, 5000);
    assert_eq!(config.bundler.cdn_base, "https://cdn.jsdelivr.net");
}

#[test]
fn test_load_invalid_empty_name() {
    let path = format!("{}/configs/invalid_empty_name.toml", FIXTURES_PATH);
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_sandboxed_native_language() {
    let path = format!("{}/configs/invalid_sandboxed_native.toml", FIXTURES_PATH);
    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("sandbox"));
}

#[test]
fn test_load_invalid_zero_timeout() {
    let path = format!("{}/configs/invalid_zero_timeout.toml", FIXTURES_PATH);
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_missing_file() {
    let path = format!("{}/configs/does_not_exist.toml", FIXTURES_PATH);
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_default_config_covers_every_harness_language() {
    let config = Config::default();
    for language in polyjudge::harness::supported_languages() {
        assert!(
            config
                .languages
                .values()
                .any(|lang| lang.harness_id() == language),
            "no configured language uses the {language} harness"
        );
    }
}
