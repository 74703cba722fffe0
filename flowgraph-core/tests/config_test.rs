//! Tests for analysis configuration loading.

use flowgraph_core::config::{AnalysisConfig, UncheckedExceptionPolicy};

#[test]
fn test_default_config() {
    let config = AnalysisConfig::default();
    assert_eq!(
        config.unchecked_exceptions,
        UncheckedExceptionPolicy::NearestTry
    );
    assert!(config.prune_dead_nodes);
    assert!(config.include_unresolved_calls);
}

#[test]
fn test_empty_toml_gives_defaults() {
    let config = AnalysisConfig::from_toml_str("").unwrap();
    assert!(config.prune_dead_nodes);
}

#[test]
fn test_toml_overrides() {
    let config = AnalysisConfig::from_toml_str(
        r#"
        unchecked_exceptions = "ignore"
        prune_dead_nodes = false
        "#,
    )
    .unwrap();
    assert_eq!(
        config.unchecked_exceptions,
        UncheckedExceptionPolicy::Ignore
    );
    assert!(!config.prune_dead_nodes);
    // Unspecified fields keep their defaults.
    assert!(config.include_unresolved_calls);
}

#[test]
fn test_bad_toml_is_an_error() {
    assert!(AnalysisConfig::from_toml_str("unchecked_exceptions = 3").is_err());
}

#[test]
fn test_round_trip() {
    let config = AnalysisConfig::default();
    let text = toml::to_string(&config).unwrap();
    let back = AnalysisConfig::from_toml_str(&text).unwrap();
    assert_eq!(back.unchecked_exceptions, config.unchecked_exceptions);
    assert_eq!(back.prune_dead_nodes, config.prune_dead_nodes);
}
