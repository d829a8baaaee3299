//! 语义键：设备资源树中被跟踪的固定键集合。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 设备状态的语义键（封闭枚举）。
///
/// 序列化名称即对外名称（UDP `WP_<key>`、MQTT `<topic>/<key>`、UI 状态字段）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SemanticKey {
    IndoorTemp,
    OutdoorTemp,
    TankTemp,
    /// 出水温度（leaving water temperature）
    #[serde(rename = "VLT")]
    Vlt,
    #[serde(rename = "Power_Heating")]
    PowerHeating,
    Mode,
    #[serde(rename = "Offset_Heat")]
    OffsetHeat,
    #[serde(rename = "Offset_Cool")]
    OffsetCool,
    #[serde(rename = "TargetVLT_Heat")]
    TargetVltHeat,
    #[serde(rename = "TargetVLT_Cool")]
    TargetVltCool,
    #[serde(rename = "Power_WW")]
    PowerWw,
    #[serde(rename = "TargetTemp_WW")]
    TargetTempWw,
    #[serde(rename = "Powerful_WW")]
    PowerfulWw,
    #[serde(rename = "Reheat_WW")]
    ReheatWw,
    Error,
    Warning,
    Emergency,
}

impl SemanticKey {
    pub const ALL: [SemanticKey; 17] = [
        SemanticKey::IndoorTemp,
        SemanticKey::OutdoorTemp,
        SemanticKey::TankTemp,
        SemanticKey::Vlt,
        SemanticKey::PowerHeating,
        SemanticKey::Mode,
        SemanticKey::OffsetHeat,
        SemanticKey::OffsetCool,
        SemanticKey::TargetVltHeat,
        SemanticKey::TargetVltCool,
        SemanticKey::PowerWw,
        SemanticKey::TargetTempWw,
        SemanticKey::PowerfulWw,
        SemanticKey::ReheatWw,
        SemanticKey::Error,
        SemanticKey::Warning,
        SemanticKey::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticKey::IndoorTemp => "IndoorTemp",
            SemanticKey::OutdoorTemp => "OutdoorTemp",
            SemanticKey::TankTemp => "TankTemp",
            SemanticKey::Vlt => "VLT",
            SemanticKey::PowerHeating => "Power_Heating",
            SemanticKey::Mode => "Mode",
            SemanticKey::OffsetHeat => "Offset_Heat",
            SemanticKey::OffsetCool => "Offset_Cool",
            SemanticKey::TargetVltHeat => "TargetVLT_Heat",
            SemanticKey::TargetVltCool => "TargetVLT_Cool",
            SemanticKey::PowerWw => "Power_WW",
            SemanticKey::TargetTempWw => "TargetTemp_WW",
            SemanticKey::PowerfulWw => "Powerful_WW",
            SemanticKey::ReheatWw => "Reheat_WW",
            SemanticKey::Error => "Error",
            SemanticKey::Warning => "Warning",
            SemanticKey::Emergency => "Emergency",
        }
    }
}

impl fmt::Display for SemanticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知语义键。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown semantic key: {}", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for SemanticKey {
    type Err = UnknownKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SemanticKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| UnknownKey(value.to_string()))
    }
}
