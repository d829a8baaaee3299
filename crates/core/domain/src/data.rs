use crate::keys::SemanticKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 设备上报的无类型标量值。
///
/// 比较按值进行，变化检测依赖这一点：`Integer(30)` 与 `Number(30.0)` 相等，
/// 文本与布尔只和同类比较。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl StateValue {
    pub fn text(value: impl Into<String>) -> Self {
        StateValue::Text(value.into())
    }

    /// 数值视图；文本按十进制解析，布尔不参与数值运算。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Bool(_) => None,
            StateValue::Integer(v) => Some(*v as f64),
            StateValue::Number(v) => Some(*v),
            StateValue::Text(v) => v.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StateValue::Bool(a), StateValue::Bool(b)) => a == b,
            (StateValue::Text(a), StateValue::Text(b)) => a == b,
            (StateValue::Integer(a), StateValue::Integer(b)) => a == b,
            (StateValue::Number(a), StateValue::Number(b)) => a == b,
            (StateValue::Integer(a), StateValue::Number(b))
            | (StateValue::Number(b), StateValue::Integer(a)) => *a as f64 == *b,
            _ => false,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Bool(v) => write!(f, "{}", v),
            StateValue::Integer(v) => write!(f, "{}", v),
            StateValue::Number(v) => write!(f, "{}", v),
            StateValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Integer(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

/// 设备状态：语义键 → 最新已知值。
///
/// 只有 `StateStore` 持有可写实例，外部消费者拿到的都是副本。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeviceState {
    values: BTreeMap<SemanticKey, StateValue>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SemanticKey) -> Option<&StateValue> {
        self.values.get(&key)
    }

    /// 写入并返回旧值。
    pub fn insert(&mut self, key: SemanticKey, value: StateValue) -> Option<StateValue> {
        self.values.insert(key, value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SemanticKey, &StateValue)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 文本值（如 Mode = "heating"）。
    pub fn text(&self, key: SemanticKey) -> Option<&str> {
        self.get(key).and_then(StateValue::as_str)
    }

    /// 数值；缺失或无法解析时为 0。
    pub fn number_or_zero(&self, key: SemanticKey) -> f64 {
        self.get(key).and_then(StateValue::as_f64).unwrap_or(0.0)
    }

    /// 组合运行模式：未开机为 0，开机时 heating=1 / cooling=2 / auto=3。
    pub fn mode_int(&self) -> u8 {
        if self.text(SemanticKey::PowerHeating) != Some("on") {
            return 0;
        }
        match self.text(SemanticKey::Mode) {
            Some("heating") => 1,
            Some("cooling") => 2,
            Some("auto") => 3,
            _ => 0,
        }
    }
}

/// 周期快照读数（只追加，不修改）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// 毫秒时间戳
    pub timestamp: i64,
    pub vlt: f64,
    pub outdoor: f64,
    pub indoor: f64,
    pub tank: f64,
    pub target: f64,
}

/// 日志级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(rename = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warning",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// 运行日志条目（只追加，按时间清理）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: LogLevel,
    pub message: String,
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
