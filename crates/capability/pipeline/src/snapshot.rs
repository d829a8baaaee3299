use domain::{DeviceState, Reading, SemanticKey, StateValue};

/// 由当前状态生成周期读数；出水温度未知、为 0 或空文本时不生成。
///
/// 缺失或无法解析的数值记为 0；目标温度按当前模式取制冷或制热设定。
pub fn snapshot_reading(state: &DeviceState, timestamp: i64) -> Option<Reading> {
    if !state.get(SemanticKey::Vlt).is_some_and(is_set) {
        return None;
    }

    let target_key = if state.text(SemanticKey::Mode) == Some("cooling") {
        SemanticKey::TargetVltCool
    } else {
        SemanticKey::TargetVltHeat
    };

    Some(Reading {
        timestamp,
        vlt: state.number_or_zero(SemanticKey::Vlt),
        outdoor: state.number_or_zero(SemanticKey::OutdoorTemp),
        indoor: state.number_or_zero(SemanticKey::IndoorTemp),
        tank: state.number_or_zero(SemanticKey::TankTemp),
        target: state.number_or_zero(target_key),
    })
}

fn is_set(value: &StateValue) -> bool {
    match value {
        StateValue::Bool(v) => *v,
        StateValue::Integer(v) => *v != 0,
        StateValue::Number(v) => *v != 0.0 && !v.is_nan(),
        StateValue::Text(v) => !v.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::StateValue;

    #[test]
    fn no_reading_without_leaving_water_temperature() {
        let mut state = DeviceState::new();
        state.insert(SemanticKey::OutdoorTemp, StateValue::Number(4.0));
        assert_eq!(snapshot_reading(&state, 1), None);
    }

    #[test]
    fn zero_or_empty_leaving_water_temperature_is_skipped() {
        let mut state = DeviceState::new();
        state.insert(SemanticKey::Vlt, StateValue::Integer(0));
        assert_eq!(snapshot_reading(&state, 1), None);
        state.insert(SemanticKey::Vlt, StateValue::Number(0.0));
        assert_eq!(snapshot_reading(&state, 1), None);
        state.insert(SemanticKey::Vlt, StateValue::text(""));
        assert_eq!(snapshot_reading(&state, 1), None);

        state.insert(SemanticKey::Vlt, StateValue::text("0"));
        assert!(snapshot_reading(&state, 1).is_some());
        state.insert(SemanticKey::Vlt, StateValue::Number(-1.5));
        assert_eq!(snapshot_reading(&state, 1).map(|r| r.vlt), Some(-1.5));
    }

    #[test]
    fn target_follows_mode() {
        let mut state = DeviceState::new();
        state.insert(SemanticKey::Vlt, StateValue::text("31.5"));
        state.insert(SemanticKey::TargetVltHeat, StateValue::Integer(35));
        state.insert(SemanticKey::TargetVltCool, StateValue::Integer(18));

        let heating = snapshot_reading(&state, 10).expect("reading");
        assert_eq!(heating.vlt, 31.5);
        assert_eq!(heating.target, 35.0);
        assert_eq!(heating.outdoor, 0.0);

        state.insert(SemanticKey::Mode, StateValue::text("cooling"));
        let cooling = snapshot_reading(&state, 20).expect("reading");
        assert_eq!(cooling.target, 18.0);
        assert_eq!(cooling.timestamp, 20);
    }
}
