//! 资源路径 → 语义键映射。
//!
//! 规则按顺序求值，第一条命中的规则生效；没有命中的路径被丢弃（不是错误）。
//! 顺序是契约的一部分：更具体的片段必须排在可能遮蔽它的宽泛片段之前，
//! 例如 `/2/Operation/Powerful` 必须先于 `/2/Operation/Power`。

use domain::{SemanticKey, StateValue};
use tracing::trace;

/// 路径谓词。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPredicate {
    /// 路径包含该片段
    Contains(String),
    /// 路径以该前缀开头
    Prefix(String),
}

impl PathPredicate {
    pub fn contains(fragment: impl Into<String>) -> Self {
        PathPredicate::Contains(fragment.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        PathPredicate::Prefix(prefix.into())
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPredicate::Contains(fragment) => path.contains(fragment.as_str()),
            PathPredicate::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// 映射规则。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub predicate: PathPredicate,
    pub key: SemanticKey,
}

impl MappingRule {
    pub fn new(predicate: PathPredicate, key: SemanticKey) -> Self {
        Self { predicate, key }
    }
}

/// 映射结果。
#[derive(Debug, Clone, PartialEq)]
pub struct MappedValue {
    pub key: SemanticKey,
    pub value: StateValue,
}

/// 有序规则表。
#[derive(Debug, Clone)]
pub struct PathMapper {
    rules: Vec<MappingRule>,
}

impl PathMapper {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// 第一条命中的规则对应的语义键。
    pub fn resolve(&self, path: &str) -> Option<SemanticKey> {
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(path))
            .map(|rule| rule.key)
    }

    pub fn map(&self, path: &str, value: StateValue) -> Option<MappedValue> {
        match self.resolve(path) {
            Some(key) => Some(MappedValue { key, value }),
            None => {
                trace!(target: "bridge.state", path, "path_unmapped");
                None
            }
        }
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

/// 设备资源树的默认规则。
pub fn default_rules() -> Vec<MappingRule> {
    use SemanticKey::*;

    let table: [(&str, SemanticKey); 17] = [
        ("Sensor/IndoorTemperature", IndoorTemp),
        ("Sensor/OutdoorTemperature", OutdoorTemp),
        ("Sensor/TankTemperature", TankTemp),
        ("Sensor/LeavingWaterTemperatureCurrent", Vlt),
        ("/1/Operation/Power", PowerHeating),
        ("/1/Operation/OperationMode", Mode),
        ("OffsetHeating", OffsetHeat),
        ("OffsetCooling", OffsetCool),
        ("LeavingWaterTemperatureHeating", TargetVltHeat),
        ("LeavingWaterTemperatureCooling", TargetVltCool),
        ("/2/Operation/Powerful", PowerfulWw),
        ("/2/Operation/Power", PowerWw),
        ("/2/Operation/TargetTemperature", TargetTempWw),
        ("ReheatState", ReheatWw),
        ("ErrorState", Error),
        ("WarningState", Warning),
        ("EmergencyState", Emergency),
    ];

    table
        .into_iter()
        .map(|(fragment, key)| MappingRule::new(PathPredicate::contains(fragment), key))
        .collect()
}
