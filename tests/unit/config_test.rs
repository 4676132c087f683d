//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_cook_scheduler::config::SchedulerConfig;

#[test]
fn test_scheduler_config_defaults() {
    let config = SchedulerConfig::default();
    assert_eq!(config.poll_interval_ms, 100);
    assert_eq!(config.generated_sub_path, "_Generated_");
    assert!(config.allow_urgent_sync_preload);
    assert_eq!(config.max_preloads_in_flight, 32);
    assert_eq!(config.max_pending_async_builds, 512);
    assert_eq!(config.cluster_batch_size, 64);
    assert!(config.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_sub_path() {
    let invalid = SchedulerConfig {
        generated_sub_path: "//".to_string(),
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_caps() {
    for invalid in [
        SchedulerConfig {
            max_preloads_in_flight: 0,
            ..SchedulerConfig::default()
        },
        SchedulerConfig {
            max_pending_async_builds: 0,
            ..SchedulerConfig::default()
        },
        SchedulerConfig {
            cluster_batch_size: 0,
            ..SchedulerConfig::default()
        },
    ] {
        assert!(invalid.validate().is_err());
    }
}

#[test]
fn test_scheduler_config_json_partial() {
    let config = SchedulerConfig::from_json_str(r#"{"poll_interval_ms": 0, "cluster_batch_size": 8}"#).unwrap();
    assert_eq!(config.poll_interval_ms, 0);
    assert_eq!(config.cluster_batch_size, 8);
    assert_eq!(config.max_preloads_in_flight, 32);
}

#[test]
fn test_scheduler_config_json_rejects_invalid() {
    let err = SchedulerConfig::from_json_str(r#"{"max_pending_async_builds": 0}"#).unwrap_err();
    assert!(err.contains("max_pending_async_builds"));

    let err = SchedulerConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_scheduler_config_json_round_trip() {
    let config = SchedulerConfig {
        allow_urgent_sync_preload: false,
        ..SchedulerConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_scheduler_config_from_file() {
    let path = std::env::temp_dir().join(format!("cook-config-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, r#"{"generated_sub_path": "_Split_"}"#).unwrap();
    let config = SchedulerConfig::from_json_file(&path).unwrap();
    assert_eq!(config.generated_sub_path, "_Split_");
    std::fs::remove_file(&path).unwrap();

    let err = SchedulerConfig::from_json_file(&path).unwrap_err();
    assert!(err.to_string().contains("reading scheduler config"));
}

#[test]
fn test_scheduler_config_from_lookup() {
    let vars: HashMap<&str, &str> = [
        ("COOK_GENERATED_SUB_PATH", "_Cells_"),
        ("COOK_MAX_PRELOADS_IN_FLIGHT", " 4 "),
        ("COOK_MAX_PENDING_ASYNC_BUILDS", "16"),
    ]
    .into();
    let config = SchedulerConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
    assert_eq!(config.generated_sub_path, "_Cells_");
    assert_eq!(config.max_preloads_in_flight, 4);
    assert_eq!(config.max_pending_async_builds, 16);
    assert_eq!(config.poll_interval_ms, 100);
}

#[test]
fn test_scheduler_config_from_lookup_validates() {
    let result = SchedulerConfig::from_lookup(|k| (k == "COOK_MAX_PRELOADS_IN_FLIGHT").then(|| "0".to_string()));
    assert!(result.is_err());
}
