//! 命令翻译：命令名 + 参数 → 设备写入（路径 + 值）。

use crate::ControlError;
use domain::{DeviceState, SemanticKey, StateValue};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const POWER_HEATING_PATH: &str = "/[0]/MNAE/1/Operation/Power";
pub const OPERATION_MODE_PATH: &str = "/[0]/MNAE/1/Operation/OperationMode";
pub const TARGET_HEATING_PATH: &str = "/[0]/MNAE/1/Operation/LeavingWaterTemperatureHeating";
pub const TARGET_COOLING_PATH: &str = "/[0]/MNAE/1/Operation/LeavingWaterTemperatureCooling";
pub const OFFSET_HEATING_PATH: &str = "/[0]/MNAE/1/Operation/LeavingWaterTemperatureOffsetHeating";
pub const HOT_WATER_POWER_PATH: &str = "/[0]/MNAE/2/Operation/Power";
pub const HOT_WATER_POWERFUL_PATH: &str = "/[0]/MNAE/2/Operation/Powerful";
pub const HOT_WATER_TARGET_PATH: &str = "/[0]/MNAE/2/Operation/TargetTemperature";

/// 制热目标温度下限：不高于该值时改写为 [`HEATING_FALLBACK_TARGET`]。
pub const HEATING_MIN_TARGET: i64 = 25;
pub const HEATING_FALLBACK_TARGET: i64 = 30;
/// 制冷目标温度上限：不低于该值时改写为 [`COOLING_FALLBACK_TARGET`]。
pub const COOLING_MAX_TARGET: i64 = 25;
pub const COOLING_FALLBACK_TARGET: i64 = 20;

/// 支持的命令（封闭集合）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// 制热回路开关（别名 `heizen`）
    Power,
    Mode,
    /// 出水目标温度
    Vlt,
    WwPower,
    WwPowerful,
    WwTemp,
    OffsetHeat,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Power => "power",
            Command::Mode => "mode",
            Command::Vlt => "vlt",
            Command::WwPower => "ww_power",
            Command::WwPowerful => "ww_powerful",
            Command::WwTemp => "ww_temp",
            Command::OffsetHeat => "offset_heat",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ControlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "power" | "heizen" => Ok(Command::Power),
            "mode" => Ok(Command::Mode),
            "vlt" => Ok(Command::Vlt),
            "ww_power" => Ok(Command::WwPower),
            "ww_powerful" => Ok(Command::WwPowerful),
            "ww_temp" => Ok(Command::WwTemp),
            "offset_heat" => Ok(Command::OffsetHeat),
            other => Err(ControlError::UnknownCommand(other.to_string())),
        }
    }
}

/// 翻译后的设备写入。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceWrite {
    pub command: Command,
    pub path: String,
    pub value: StateValue,
}

/// 命令翻译器（无状态，依赖调用方传入当前设备状态）。
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTranslator;

impl CommandTranslator {
    pub fn new() -> Self {
        Self
    }

    pub fn translate(
        &self,
        name: &str,
        argument: &str,
        state: &DeviceState,
    ) -> Result<DeviceWrite, ControlError> {
        let command: Command = name.parse()?;
        let (path, value) = match command {
            Command::Power => (POWER_HEATING_PATH, power_token(argument)),
            Command::Mode => (OPERATION_MODE_PATH, StateValue::text(argument)),
            Command::Vlt => {
                let target = parse_integer(command, argument)?;
                vlt_target(state, target)?
            }
            Command::WwPower => (HOT_WATER_POWER_PATH, power_token(argument)),
            Command::WwPowerful => {
                let on = matches!(argument, "1" | "on");
                (HOT_WATER_POWERFUL_PATH, StateValue::Integer(i64::from(on)))
            }
            Command::WwTemp => (
                HOT_WATER_TARGET_PATH,
                StateValue::Integer(parse_integer(command, argument)?),
            ),
            Command::OffsetHeat => (OFFSET_HEATING_PATH, parse_number(command, argument)?),
        };

        Ok(DeviceWrite {
            command,
            path: path.to_string(),
            value,
        })
    }
}

/// 出水目标温度按当前模式钳制。模式未知（或待机）时按制热处理。
fn vlt_target(state: &DeviceState, target: i64) -> Result<(&'static str, StateValue), ControlError> {
    let mode = match state.text(SemanticKey::Mode) {
        None | Some("standby") => "heating",
        Some(mode) => mode,
    };
    match mode {
        "heating" => {
            let target = if target <= HEATING_MIN_TARGET {
                HEATING_FALLBACK_TARGET
            } else {
                target
            };
            Ok((TARGET_HEATING_PATH, StateValue::Integer(target)))
        }
        "cooling" => {
            let target = if target >= COOLING_MAX_TARGET {
                COOLING_FALLBACK_TARGET
            } else {
                target
            };
            Ok((TARGET_COOLING_PATH, StateValue::Integer(target)))
        }
        other => Err(ControlError::UnsupportedMode(other.to_string())),
    }
}

fn power_token(argument: &str) -> StateValue {
    if is_truthy(argument) {
        StateValue::text("on")
    } else {
        StateValue::text("standby")
    }
}

fn is_truthy(argument: &str) -> bool {
    matches!(argument, "1" | "on" | "true")
}

/// 整数参数；带小数时截断（"25.7" → 25）。
fn parse_integer(command: Command, argument: &str) -> Result<i64, ControlError> {
    let trimmed = argument.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value.trunc() as i64),
        _ => Err(ControlError::invalid_argument(command, argument)),
    }
}

/// 浮点参数；整数值按整数下发。
fn parse_number(command: Command, argument: &str) -> Result<StateValue, ControlError> {
    match argument.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => {
            Ok(StateValue::Integer(value as i64))
        }
        Ok(value) if value.is_finite() => Ok(StateValue::Number(value)),
        _ => Err(ControlError::invalid_argument(command, argument)),
    }
}

/// 外部入口（HTTP、总线）的参数预规整。
///
/// `power`/`ww_power`：`1`/`true` → `on`，`0`/`false` → `standby`；
/// `mode`：`1`/`2`/`3`/`0` → `heating`/`cooling`/`auto`/`standby`。
pub fn normalize_command_argument(name: &str, argument: &str) -> String {
    match (name, argument) {
        ("power" | "ww_power", "1" | "true") => "on".to_string(),
        ("power" | "ww_power", "0" | "false") => "standby".to_string(),
        ("mode", "1") => "heating".to_string(),
        ("mode", "2") => "cooling".to_string(),
        ("mode", "3") => "auto".to_string(),
        ("mode", "0") => "standby".to_string(),
        _ => argument.to_string(),
    }
}
