use bridge_config::{AppConfig, BridgeSettings, SettingsStore};
use serde_json::json;
use std::time::Duration;

fn temp_settings_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("bridge-settings-{}.json", uuid::Uuid::new_v4()))
}

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("BRIDGE_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("BRIDGE_REQUEST_TIMEOUT_MS", "50");
        std::env::set_var("BRIDGE_LOG_RETENTION_DAYS", "7");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.request_timeout, Duration::from_millis(200));
    assert_eq!(config.log_retention_days, 7);
    assert_eq!(config.snapshot_interval, Duration::from_secs(60));
}

#[test]
fn missing_settings_file_is_created_with_defaults() {
    let path = temp_settings_path();
    let store = SettingsStore::new(&path);

    let settings = store.load().expect("load");
    assert_eq!(settings, BridgeSettings::default());
    assert!(path.exists());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(written["deviceAddress"], json!("192.168.1.36"));
    assert_eq!(written["busTopic"], json!("daikin"));
    std::fs::remove_file(&path).expect("cleanup");
}

#[test]
fn update_merges_patch_over_current_file() {
    let path = temp_settings_path();
    std::fs::write(&path, r#"{"deviceAddress": "10.0.0.9", "heartbeatSecs": "abc"}"#)
        .expect("seed");
    let store = SettingsStore::new(&path);

    let loaded = store.load().expect("load");
    assert_eq!(loaded.device_address, "10.0.0.9");
    assert_eq!(loaded.heartbeat_secs, None);
    assert_eq!(loaded.controller_port, 7888);

    let merged = store
        .update(&json!({"busBroker": "mqtt://broker:1883", "heartbeatSecs": "30"}))
        .expect("update");
    assert_eq!(merged.device_address, "10.0.0.9");
    assert_eq!(merged.bus_broker, "mqtt://broker:1883");
    assert_eq!(merged.heartbeat_secs, Some(30));
    assert_eq!(store.load().expect("reload"), merged);

    assert!(store.update(&json!(["not", "an", "object"])).is_err());
    std::fs::remove_file(&path).expect("cleanup");
}
