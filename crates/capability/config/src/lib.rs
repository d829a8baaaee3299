//! 运行配置加载：进程级环境变量 + 可在运行中修改的桥接设置文件。

mod settings;

pub use settings::{BridgeSettings, SettingsStore};

use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings document error: {0}")]
    Document(#[from] serde_json::Error),
}

/// 关联请求超时允许的区间（毫秒）。
pub const REQUEST_TIMEOUT_RANGE_MS: (u64, u64) = (200, 500);

/// 进程级运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub settings_path: String,
    pub request_timeout: Duration,
    /// 0 表示不清理日志
    pub log_retention_days: u64,
    pub snapshot_interval: Duration,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("BRIDGE_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8666".to_string());
        let database_url = env::var("BRIDGE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://history.db?mode=rwc".to_string());
        let settings_path =
            env::var("BRIDGE_SETTINGS_PATH").unwrap_or_else(|_| "config.json".to_string());
        let (min, max) = REQUEST_TIMEOUT_RANGE_MS;
        let request_timeout_ms =
            read_u64_with_default("BRIDGE_REQUEST_TIMEOUT_MS", max)?.clamp(min, max);
        let log_retention_days = read_u64_with_default("BRIDGE_LOG_RETENTION_DAYS", 30)?;
        let snapshot_interval_secs = read_u64_with_default("BRIDGE_SNAPSHOT_INTERVAL_SECS", 60)?;
        if snapshot_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "BRIDGE_SNAPSHOT_INTERVAL_SECS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            http_addr,
            database_url,
            settings_path,
            request_timeout: Duration::from_millis(request_timeout_ms),
            log_retention_days,
            snapshot_interval: Duration::from_secs(snapshot_interval_secs),
        })
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(default),
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}
