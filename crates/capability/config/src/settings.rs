//! 桥接设置文件（扁平 JSON，camelCase 键）。
//!
//! 每次修改都重新读取文件再合并补丁，外部对文件的手工修改不会被覆盖。

use crate::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// 可在运行中修改的设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    pub device_address: String,
    pub controller_host: String,
    pub controller_port: u16,
    /// 缺失或无法解析时为 `None`，由心跳按默认间隔处理
    #[serde(deserialize_with = "lenient_u64")]
    pub heartbeat_secs: Option<u64>,
    pub convert_text_to_num: bool,
    pub bus_broker: String,
    pub bus_topic: String,
    pub bus_username: String,
    pub bus_password: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            device_address: "192.168.1.36".to_string(),
            controller_host: "192.168.1.200".to_string(),
            controller_port: 7888,
            heartbeat_secs: Some(90),
            convert_text_to_num: true,
            bus_broker: String::new(),
            bus_topic: "daikin".to_string(),
            bus_username: String::new(),
            bus_password: String::new(),
        }
    }
}

/// 数字或数字字符串 → `Some`，其余 → `None`
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

/// 设置文件存储。
pub struct SettingsStore {
    path: PathBuf,
    // 串行化读-合并-写
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置；文件不存在时以默认值创建。
    pub fn load(&self) -> Result<BridgeSettings, ConfigError> {
        if !self.path.exists() {
            let defaults = BridgeSettings::default();
            self.write(&defaults)?;
            info!(target: "bridge.config", path = %self.path.display(), "settings_created");
            return Ok(defaults);
        }
        let text = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// 合并补丁并写回，返回合并后的设置。
    ///
    /// 补丁必须是 JSON 对象；未知键被丢弃。
    pub fn update(&self, patch: &Value) -> Result<BridgeSettings, ConfigError> {
        let Value::Object(patch) = patch else {
            return Err(ConfigError::Invalid(
                "settings".to_string(),
                patch.to_string(),
            ));
        };
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = self.load()?;
        let mut document = serde_json::to_value(&current)?;
        if let Value::Object(fields) = &mut document {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        let merged: BridgeSettings = serde_json::from_value(document)?;
        self.write(&merged)?;
        info!(
            target: "bridge.config",
            keys = ?patch.keys().collect::<Vec<_>>(),
            "settings_updated"
        );
        Ok(merged)
    }

    fn write(&self, settings: &BridgeSettings) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
